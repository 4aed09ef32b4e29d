//! HTTP transport seam for the market client.
//!
//! The client talks to the statistics API through the [`MarketTransport`]
//! trait so that batching, spacing, and retry behavior can be exercised in
//! tests without a network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::errors::Result;

/// User agent sent with every request.
const USER_AGENT: &str = "craftbook/0.2";

/// A raw reply from the statistics API, reduced to what the retry and
/// parsing layers need.
#[derive(Clone, Debug)]
pub struct TransportReply {
    /// HTTP status code
    pub status: u16,
    /// Parsed `Retry-After` delay, when the API supplied one
    pub retry_after: Option<Duration>,
    /// Response body text
    pub body: String,
}

impl TransportReply {
    /// Whether the status is a 2xx success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over a GET round-trip to the statistics API. The timeout is
/// per request because the price and history endpoints use different ones.
#[async_trait]
pub trait MarketTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportReply>;
}

/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketTransport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportReply> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await?;

        Ok(TransportReply {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse a `Retry-After` header value: either delay-seconds or an HTTP date.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }

    let date = DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-3"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_retry_after_past_http_date_clamps_to_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_reply_success_range() {
        let reply = TransportReply {
            status: 204,
            retry_after: None,
            body: String::new(),
        };
        assert!(reply.is_success());

        let reply = TransportReply {
            status: 429,
            retry_after: None,
            body: String::new(),
        };
        assert!(!reply.is_success());
    }
}

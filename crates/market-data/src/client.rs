//! Batched, throttle-aware client for the market statistics API.
//!
//! Item ids are split into fixed-size batches (live prices and history use
//! different sizes), batches run strictly sequentially with a fixed spacing
//! delay between them, and throttling responses are retried with exponential
//! backoff honoring any structured `Retry-After` signal. Any other
//! non-success status aborts the logical request immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use log::{debug, warn};

use crate::aggregate::{aggregate_prices, aggregate_volumes};
use crate::errors::{MarketError, Result};
use crate::models::{HistoryRow, PriceMode, PriceRow};
use crate::transport::{HttpTransport, MarketTransport};

/// Configuration for the market client.
///
/// Defaults reproduce the public statistics API limits; tests shrink the
/// batch sizes and zero the delays.
#[derive(Clone, Debug)]
pub struct MarketConfig {
    /// Base URL of the live price endpoint
    pub price_url: String,
    /// Base URL of the history endpoint
    pub history_url: String,
    /// Item ids per live price request
    pub price_batch_size: usize,
    /// Item ids per history request
    pub history_batch_size: usize,
    /// Delay inserted before every live price batch except the first
    pub price_spacing: Duration,
    /// Delay inserted before every history batch except the first
    pub history_spacing: Duration,
    /// Maximum retries of one batch on throttling
    pub retry_limit: u32,
    /// Seed for the exponential backoff delay
    pub retry_base: Duration,
    /// Cap for the backoff delay
    pub retry_cap: Duration,
    /// Per-request timeout for the live price endpoint
    pub price_timeout: Duration,
    /// Per-request timeout for the history endpoint
    pub history_timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_url: "https://www.albion-online-data.com/api/v2/stats/prices".to_string(),
            history_url: "https://www.albion-online-data.com/api/v2/stats/history".to_string(),
            price_batch_size: 150,
            history_batch_size: 80,
            price_spacing: Duration::from_millis(250),
            history_spacing: Duration::from_millis(250),
            retry_limit: 6,
            retry_base: Duration::from_millis(1200),
            retry_cap: Duration::from_secs(15),
            price_timeout: Duration::from_secs(25),
            history_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the price and history endpoints.
pub struct MarketClient {
    transport: Arc<dyn MarketTransport>,
    config: MarketConfig,
}

impl MarketClient {
    /// Create a client with the production HTTP transport.
    pub fn new(config: MarketConfig) -> Self {
        let transport = Arc::new(HttpTransport::new());
        Self { transport, config }
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: MarketConfig, transport: Arc<dyn MarketTransport>) -> Self {
        Self { transport, config }
    }

    /// Fetch live price rows for the given items, batching as needed.
    pub async fn fetch_price_rows(
        &self,
        city: &str,
        item_ids: &[String],
        quality: u32,
    ) -> Result<Vec<PriceRow>> {
        let mut rows = Vec::new();
        for (index, batch) in item_ids.chunks(self.config.price_batch_size.max(1)).enumerate() {
            if index > 0 && !self.config.price_spacing.is_zero() {
                tokio::time::sleep(self.config.price_spacing).await;
            }
            let url = self.price_batch_url(city, batch, quality);
            let body = self
                .get_with_backoff(&url, self.config.price_timeout)
                .await?;
            let mut parsed: Vec<PriceRow> = serde_json::from_str(&body)
                .map_err(|e| MarketError::InvalidResponse(e.to_string()))?;
            rows.append(&mut parsed);
        }
        Ok(rows)
    }

    /// Fetch history rows covering the last `average_days` days.
    pub async fn fetch_history_rows(
        &self,
        city: &str,
        item_ids: &[String],
        quality: u32,
        average_days: u32,
    ) -> Result<Vec<HistoryRow>> {
        let mut rows = Vec::new();
        for (index, batch) in item_ids
            .chunks(self.config.history_batch_size.max(1))
            .enumerate()
        {
            if index > 0 && !self.config.history_spacing.is_zero() {
                tokio::time::sleep(self.config.history_spacing).await;
            }
            let url = self.history_batch_url(city, batch, quality, average_days);
            let body = self
                .get_with_backoff(&url, self.config.history_timeout)
                .await?;
            let mut parsed: Vec<HistoryRow> = serde_json::from_str(&body)
                .map_err(|e| MarketError::InvalidResponse(e.to_string()))?;
            rows.append(&mut parsed);
        }
        Ok(rows)
    }

    /// Fetch a live price per item. Rows reporting a different non-zero
    /// quality are skipped; items without a positive value are omitted.
    pub async fn fetch_live_prices(
        &self,
        city: &str,
        item_ids: &[String],
        quality: u32,
        mode: PriceMode,
    ) -> Result<HashMap<String, u64>> {
        let rows = self.fetch_price_rows(city, item_ids, quality).await?;

        let mut prices = HashMap::new();
        for row in rows {
            let item_id = row.item_id.trim();
            if item_id.is_empty() {
                continue;
            }
            if row.quality > 0 && row.quality != quality {
                continue;
            }
            if let Some(price) = row.live_price(mode) {
                prices.entry(item_id.to_string()).or_insert(price);
            }
        }
        Ok(prices)
    }

    /// Fetch a weighted average sell price per item over `average_days`.
    pub async fn fetch_average_prices(
        &self,
        city: &str,
        item_ids: &[String],
        quality: u32,
        average_days: u32,
    ) -> Result<HashMap<String, u64>> {
        let since = Utc::now() - chrono::Duration::days(average_days.max(1) as i64);
        let rows = self
            .fetch_history_rows(city, item_ids, quality, average_days)
            .await?;
        Ok(aggregate_prices(&rows, Some(since)))
    }

    /// Fetch a recency-weighted average daily volume per item.
    pub async fn fetch_average_volumes(
        &self,
        city: &str,
        item_ids: &[String],
        quality: u32,
        average_days: u32,
    ) -> Result<HashMap<String, u64>> {
        let now = Utc::now();
        let since = now - chrono::Duration::days(average_days.max(1) as i64);
        let rows = self
            .fetch_history_rows(city, item_ids, quality, average_days)
            .await?;
        Ok(aggregate_volumes(&rows, Some(since), average_days, now))
    }

    /// GET with backoff on throttling. Retries the same URL up to
    /// `retry_limit` times on 429, then surfaces the exhaustion; any other
    /// non-success status surfaces immediately.
    async fn get_with_backoff(&self, url: &str, timeout: Duration) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            let reply = self.transport.get(url, timeout).await?;

            if reply.status == 429 {
                if attempt >= self.config.retry_limit {
                    return Err(MarketError::RateLimitExhausted { attempts: attempt });
                }
                let backoff = reply.retry_after.unwrap_or_else(|| {
                    let exponential = self
                        .config
                        .retry_base
                        .saturating_mul(1u32 << attempt.min(16));
                    exponential.min(self.config.retry_cap)
                });
                warn!(
                    "Market API throttled (attempt {}), backing off {:?}",
                    attempt + 1,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            if !reply.is_success() {
                return Err(MarketError::Http {
                    status: reply.status,
                });
            }

            debug!("Market API GET ok ({} bytes)", reply.body.len());
            return Ok(reply.body);
        }
    }

    fn price_batch_url(&self, city: &str, batch: &[String], quality: u32) -> String {
        format!(
            "{}/{}.json?locations={}&qualities={}",
            self.config.price_url,
            batch.join(","),
            urlencoding::encode(city),
            quality
        )
    }

    fn history_batch_url(
        &self,
        city: &str,
        batch: &[String],
        quality: u32,
        average_days: u32,
    ) -> String {
        let end = Utc::now();
        let start = end - chrono::Duration::days(average_days.max(1) as i64);
        format!(
            "{}/{}.json?locations={}&qualities={}&time-scale=24&date={}&end_date={}",
            self.config.history_url,
            batch.join(","),
            urlencoding::encode(city),
            quality,
            format_market_date(start),
            format_market_date(end)
        )
    }
}

/// The history endpoint expects non-zero-padded `month-day-year` dates.
fn format_market_date(date: DateTime<Utc>) -> String {
    format!("{}-{}-{}", date.month(), date.day(), date.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportReply;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Scripted transport: pops replies in order and records every URL and
    /// the timeout it was asked to apply.
    struct ScriptedTransport {
        replies: Mutex<Vec<TransportReply>>,
        requests: Mutex<Vec<(String, Duration)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<TransportReply>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        fn timeouts(&self) -> Vec<Duration> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(_, timeout)| *timeout)
                .collect()
        }
    }

    #[async_trait]
    impl MarketTransport for ScriptedTransport {
        async fn get(&self, url: &str, timeout: Duration) -> Result<TransportReply> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), timeout));
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| ok_reply("[]")))
        }
    }

    fn ok_reply(body: &str) -> TransportReply {
        TransportReply {
            status: 200,
            retry_after: None,
            body: body.to_string(),
        }
    }

    fn throttled_reply() -> TransportReply {
        TransportReply {
            status: 429,
            retry_after: Some(Duration::ZERO),
            body: String::new(),
        }
    }

    fn test_config() -> MarketConfig {
        MarketConfig {
            price_batch_size: 2,
            history_batch_size: 2,
            price_spacing: Duration::ZERO,
            history_spacing: Duration::ZERO,
            retry_limit: 3,
            retry_base: Duration::ZERO,
            retry_cap: Duration::ZERO,
            ..MarketConfig::default()
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batches_split_and_run_in_order() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_reply("[]"),
            ok_reply("[]"),
        ]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        client
            .fetch_price_rows("Lymhurst", &ids(&["A", "B", "C"]), 1)
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("/A,B.json"));
        assert!(requests[1].contains("/C.json"));
        assert!(requests[0].contains("locations=Lymhurst"));
        assert!(requests[0].contains("qualities=1"));
    }

    #[tokio::test]
    async fn test_city_names_are_url_encoded() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply("[]")]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        client
            .fetch_price_rows("Fort Sterling", &ids(&["A"]), 1)
            .await
            .unwrap();

        assert!(transport.requests()[0].contains("locations=Fort%20Sterling"));
    }

    #[tokio::test]
    async fn test_history_url_carries_date_range() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply("[]")]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        client
            .fetch_history_rows("Lymhurst", &ids(&["A"]), 2, 7)
            .await
            .unwrap();

        let url = &transport.requests()[0];
        assert!(url.contains("time-scale=24"));
        assert!(url.contains("date="));
        assert!(url.contains("end_date="));
        assert!(url.contains("qualities=2"));
    }

    #[tokio::test]
    async fn test_endpoints_use_their_own_timeouts() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply("[]"), ok_reply("[]")]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        client
            .fetch_price_rows("Lymhurst", &ids(&["A"]), 1)
            .await
            .unwrap();
        client
            .fetch_history_rows("Lymhurst", &ids(&["A"]), 1, 7)
            .await
            .unwrap();

        assert_eq!(
            transport.timeouts(),
            vec![Duration::from_secs(25), Duration::from_secs(30)]
        );
    }

    #[tokio::test]
    async fn test_throttling_retried_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            throttled_reply(),
            throttled_reply(),
            ok_reply("[]"),
        ]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        client
            .fetch_price_rows("Lymhurst", &ids(&["A"]), 1)
            .await
            .unwrap();

        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_throttling_exhausts_after_retry_limit() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            throttled_reply(),
            throttled_reply(),
            throttled_reply(),
            throttled_reply(),
            throttled_reply(),
        ]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        let error = client
            .fetch_price_rows("Lymhurst", &ids(&["A"]), 1)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            MarketError::RateLimitExhausted { attempts: 3 }
        ));
        // Initial request plus exactly retry_limit retries.
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_without_retry() {
        let transport = Arc::new(ScriptedTransport::new(vec![TransportReply {
            status: 500,
            retry_after: None,
            body: String::new(),
        }]));
        let client = MarketClient::with_transport(test_config(), transport.clone());

        let error = client
            .fetch_price_rows("Lymhurst", &ids(&["A"]), 1)
            .await
            .unwrap_err();

        assert!(matches!(error, MarketError::Http { status: 500 }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_live_prices_skip_quality_mismatch_and_zero() {
        let body = r#"[
            {"item_id": "A", "quality": 1, "sell_price_min": 100, "buy_price_max": 0},
            {"item_id": "B", "quality": 3, "sell_price_min": 999, "buy_price_max": 0},
            {"item_id": "C", "quality": 0, "sell_price_min": 0, "buy_price_max": 0}
        ]"#;
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply(body)]));
        let client = MarketClient::with_transport(test_config(), transport);

        let prices = client
            .fetch_live_prices("Lymhurst", &ids(&["A", "B"]), 1, PriceMode::Material)
            .await
            .unwrap();

        assert_eq!(prices.get("A"), Some(&100));
        assert!(!prices.contains_key("B"));
        assert!(!prices.contains_key("C"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_reply("not json")]));
        let client = MarketClient::with_transport(test_config(), transport);

        let error = client
            .fetch_price_rows("Lymhurst", &ids(&["A"]), 1)
            .await
            .unwrap_err();
        assert!(matches!(error, MarketError::InvalidResponse(_)));
    }

    #[test]
    fn test_market_date_format_is_not_zero_padded() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        assert_eq!(format_market_date(date), "3-5-2024");
    }
}

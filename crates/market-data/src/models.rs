//! Wire models for the price and history endpoints.
//!
//! The statistics API (and its mirrors) are not entirely consistent about
//! field spelling, so deserialization accepts the known alternate names via
//! serde aliases. Timestamps arrive as RFC 3339 strings, bare date-times, or
//! unix epoch numbers; all three are folded into `DateTime<Utc>`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// Default quality requested when the caller supplies none or nonsense.
pub const DEFAULT_QUALITY: u32 = 1;

/// Default averaging window in days for history requests.
pub const DEFAULT_AVERAGE_DAYS: u32 = 1;

/// Upper bound for the averaging window.
pub const MAX_AVERAGE_DAYS: u32 = 120;

/// One row from the live price endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct PriceRow {
    /// Item identifier
    #[serde(alias = "itemId", alias = "item", alias = "id")]
    pub item_id: String,

    /// Quality tier reported for this row (0 when unspecified)
    #[serde(default)]
    pub quality: u32,

    /// Lowest current sell order price (0 when no orders)
    #[serde(default)]
    pub sell_price_min: u64,

    /// Highest current buy order price (0 when no orders)
    #[serde(default)]
    pub buy_price_max: u64,
}

impl PriceRow {
    /// Pick the live price for the requested mode, or `None` when the row
    /// has no usable value. `Material` prefers sell orders and falls back
    /// to buy orders; zero is never reported.
    pub fn live_price(&self, mode: PriceMode) -> Option<u64> {
        let pick = match mode {
            PriceMode::Buy => self.buy_price_max,
            PriceMode::Sell | PriceMode::SellAvg => self.sell_price_min,
            PriceMode::Material | PriceMode::VolumeAvg => {
                if self.sell_price_min > 0 {
                    self.sell_price_min
                } else {
                    self.buy_price_max
                }
            }
        };
        (pick > 0).then_some(pick)
    }
}

/// One time-series sample from the history endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TimeSeriesPoint {
    /// Sample timestamp; `None` when absent or unparseable
    #[serde(
        default,
        alias = "date",
        alias = "time",
        deserialize_with = "de_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    /// Average traded price over the sample period
    #[serde(default, alias = "avgPrice")]
    pub avg_price: f64,

    /// Number of items traded over the sample period
    #[serde(default, alias = "itemCount", alias = "count")]
    pub item_count: f64,
}

/// One row from the history endpoint: an item id plus its samples.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryRow {
    /// Item identifier
    #[serde(alias = "itemId", alias = "item", alias = "id")]
    pub item_id: String,

    /// Time-series samples for the item
    #[serde(default, rename = "data", alias = "prices")]
    pub points: Vec<TimeSeriesPoint>,
}

/// Which scalar the caller wants per item.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PriceMode {
    /// Sell price with buy fallback (default)
    Material,
    /// Lowest sell order only
    Sell,
    /// Highest buy order only
    Buy,
    /// Weighted average sell price over a history window
    SellAvg,
    /// Recency-weighted average daily volume over a history window
    VolumeAvg,
}

impl PriceMode {
    /// Parse a mode token; anything unknown falls back to `Material`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sell" => Self::Sell,
            "buy" => Self::Buy,
            "sell_avg" => Self::SellAvg,
            "volume_avg" => Self::VolumeAvg,
            _ => Self::Material,
        }
    }

    /// True for the modes served by the history endpoint.
    pub fn uses_history(&self) -> bool {
        matches!(self, Self::SellAvg | Self::VolumeAvg)
    }
}

/// Clamp a requested quality into the valid 1..=5 range.
pub fn parse_quality(raw: Option<i64>) -> u32 {
    match raw {
        Some(q) if (1..=5).contains(&q) => q as u32,
        _ => DEFAULT_QUALITY,
    }
}

/// Clamp a requested averaging window into 1..=120 days.
pub fn parse_average_days(raw: Option<i64>) -> u32 {
    match raw {
        Some(d) if d >= 1 => (d as u64).min(MAX_AVERAGE_DAYS as u64) as u32,
        _ => DEFAULT_AVERAGE_DAYS,
    }
}

/// Trim, drop empties, and deduplicate item ids while preserving order.
pub fn unique_item_ids<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for raw_id in raw {
        let id = raw_id.as_ref().trim();
        if id.is_empty() || out.iter().any(|seen: &String| seen == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}

/// Accepts a timestamp as an RFC 3339 string, a bare `%Y-%m-%dT%H:%M:%S`
/// string, or a unix epoch number (seconds or milliseconds).
fn de_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}

/// Best-effort timestamp coercion; `None` when the value is unusable.
pub fn parse_timestamp(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        serde_json::Value::Number(num) => {
            let value = num.as_f64()?;
            if !value.is_finite() || value <= 0.0 {
                return None;
            }
            // Heuristic: epoch seconds fit in ten digits until the year 2286.
            let millis = if value < 1e12 { value * 1000.0 } else { value };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

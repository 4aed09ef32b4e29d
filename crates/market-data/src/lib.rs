//! Craftbook Market Data Crate
//!
//! This crate fetches volatile price and volume statistics for game items
//! from a rate-limited external statistics API and reduces the raw
//! time-series samples into per-item scalar aggregates.
//!
//! # Overview
//!
//! - Requests are batched (live prices and history use different batch
//!   sizes) and run strictly sequentially with a fixed spacing delay, to
//!   respect the API's rate limits.
//! - Throttling responses (429) are retried with exponential backoff,
//!   honoring a structured `Retry-After` signal when present; any other
//!   failure surfaces immediately.
//! - History samples are reduced to a weighted mean price (weight = sample
//!   size) or a recency-weighted mean volume.
//!
//! # Core Types
//!
//! - [`MarketClient`] - batched, throttle-aware API client
//! - [`MarketConfig`] - endpoint URLs, batch sizes, delays, retry policy
//! - [`MarketTransport`] - HTTP seam, fakeable in tests
//! - [`PriceRow`] / [`HistoryRow`] / [`TimeSeriesPoint`] - wire models
//! - [`PriceMode`] - which scalar the caller wants per item
//! - [`MarketError`] - error taxonomy with throttling classification

pub mod aggregate;
pub mod client;
pub mod errors;
pub mod models;
pub mod transport;

pub use aggregate::{aggregate_prices, aggregate_volumes};
pub use client::{MarketClient, MarketConfig};
pub use errors::{MarketError, Result};
pub use models::{
    parse_average_days, parse_quality, unique_item_ids, HistoryRow, PriceMode, PriceRow,
    TimeSeriesPoint, DEFAULT_AVERAGE_DAYS, DEFAULT_QUALITY, MAX_AVERAGE_DAYS,
};
pub use transport::{HttpTransport, MarketTransport, TransportReply};

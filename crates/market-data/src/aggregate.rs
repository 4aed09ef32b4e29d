//! Reduction of raw time-series samples into per-item scalar aggregates.
//!
//! Two reductions are supported:
//!
//! - weighted mean price, weighted by the declared sample size;
//! - recency-weighted mean daily volume, weighted by how close each sample
//!   sits to the end of the averaging window.
//!
//! Items that accumulate zero weight, or whose mean rounds to zero, are
//! omitted rather than reported as zero, so the caller never has to
//! distinguish "no data" from "free".

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::HistoryRow;

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Weighted mean price per item across every sample at or after `since`.
///
/// Weight is the sample's declared item count when positive, else 1.
/// Samples with a non-positive average price are skipped.
pub fn aggregate_prices(
    rows: &[HistoryRow],
    since: Option<DateTime<Utc>>,
) -> HashMap<String, u64> {
    let mut buckets: HashMap<String, (f64, f64)> = HashMap::new();

    for row in rows {
        if row.item_id.is_empty() || row.points.is_empty() {
            continue;
        }
        let bucket = buckets.entry(row.item_id.clone()).or_insert((0.0, 0.0));

        for point in &row.points {
            if is_before_cutoff(point.timestamp, since) {
                continue;
            }
            if !(point.avg_price > 0.0) {
                continue;
            }

            let weight = if point.item_count > 0.0 {
                point.item_count
            } else {
                1.0
            };
            bucket.0 += point.avg_price * weight;
            bucket.1 += weight;
        }
    }

    finalize(buckets)
}

/// Recency-weighted mean daily volume per item.
///
/// Each sample's weight is `max(1, window_days - days_ago)`; samples without
/// a timestamp are treated as sitting at the old end of the window. `now`
/// is a parameter so the reduction is deterministic under test.
pub fn aggregate_volumes(
    rows: &[HistoryRow],
    since: Option<DateTime<Utc>>,
    window_days: u32,
    now: DateTime<Utc>,
) -> HashMap<String, u64> {
    let window_days = window_days.max(1) as f64;
    let mut buckets: HashMap<String, (f64, f64)> = HashMap::new();

    for row in rows {
        if row.item_id.is_empty() || row.points.is_empty() {
            continue;
        }
        let bucket = buckets.entry(row.item_id.clone()).or_insert((0.0, 0.0));

        for point in &row.points {
            if is_before_cutoff(point.timestamp, since) {
                continue;
            }
            if !(point.item_count > 0.0) {
                continue;
            }

            let days_ago = match point.timestamp {
                Some(ts) => ((now - ts).num_milliseconds() as f64 / MS_PER_DAY).max(0.0),
                None => window_days - 1.0,
            };
            let weight = (window_days - days_ago).max(1.0);
            bucket.0 += point.item_count * weight;
            bucket.1 += weight;
        }
    }

    finalize(buckets)
}

fn is_before_cutoff(timestamp: Option<DateTime<Utc>>, since: Option<DateTime<Utc>>) -> bool {
    match (timestamp, since) {
        (Some(ts), Some(cutoff)) => ts < cutoff,
        _ => false,
    }
}

fn finalize(buckets: HashMap<String, (f64, f64)>) -> HashMap<String, u64> {
    buckets
        .into_iter()
        .filter(|(_, (_, weight))| *weight > 0.0)
        .filter_map(|(item_id, (weighted, weight))| {
            let value = (weighted / weight).round() as u64;
            (value > 0).then_some((item_id, value))
        })
        .collect()
}

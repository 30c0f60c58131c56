//! Per-user lifetime-value estimation as of a snapshot date.
//!
//! The model is deliberately simple:
//! `LTV = average purchase value * monthly purchase frequency * assumed lifetime`.
//! Frequency rules:
//! - a single purchase counts as once per month going forward
//! - otherwise observed purchases per day over the span since the first
//!   purchase, scaled to a 30-day month
//! - floored at 0.1 purchases per month so long-dormant buyers never decay
//!   to a near-zero estimate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

/// One completed purchase. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub price: f64,
    pub date: DateTime<Utc>,
}

/// Named constants of the estimation model. Defaults reproduce the
/// production formula; tests tune them for boundary coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtvConfig {
    pub lifetime_months: f64,
    pub days_per_month: f64,
    pub min_monthly_frequency: f64,
}

impl Default for LtvConfig {
    fn default() -> Self {
        Self {
            lifetime_months: 12.0,
            days_per_month: 30.0,
            min_monthly_frequency: 0.1,
        }
    }
}

/// The instant a calendar day stands for: its midnight, UTC.
///
/// A transaction qualifies for a snapshot day iff its timestamp is at or
/// before this instant, so an intraday purchase first shows up on the
/// following day's snapshot.
pub fn snapshot_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time of day")
        .and_utc()
}

/// Estimates one user's LTV as of `snapshot`.
///
/// Returns `0.0` exactly when the user has no transaction on or before the
/// snapshot instant; any qualifying history yields a positive estimate for
/// positive prices.
pub fn estimate_ltv(history: &[Transaction], snapshot: NaiveDate, cfg: &LtvConfig) -> f64 {
    let as_of = snapshot_instant(snapshot);
    let mut qualifying: Vec<&Transaction> = history.iter().filter(|tx| tx.date <= as_of).collect();
    if qualifying.is_empty() {
        return 0.0;
    }

    // Date-sorted before summing so the incremental aggregation scan, which
    // accumulates in date order, reproduces the same floating-point result.
    qualifying.sort_by_key(|tx| tx.date);

    let total: f64 = qualifying.iter().map(|tx| tx.price).sum();
    let count = qualifying.len();
    let apv = total / count as f64;

    let first = qualifying[0].date;
    let frequency = monthly_frequency(count, first, as_of, cfg);

    apv * frequency * cfg.lifetime_months
}

/// Purchases per month implied by `count` purchases since `first`, observed
/// at `as_of`. Shared by the one-shot estimate and the incremental
/// aggregation scan, which must agree bit for bit.
pub(crate) fn monthly_frequency(
    count: usize,
    first: DateTime<Utc>,
    as_of: DateTime<Utc>,
    cfg: &LtvConfig,
) -> f64 {
    if count == 1 {
        return 1.0;
    }

    let elapsed_days = ceil_days(as_of - first);
    if elapsed_days <= 0 {
        // Same-day purchase burst: treat as once per month.
        return 1.0;
    }

    let actual_days = elapsed_days.max(1);
    let per_day = count as f64 / actual_days as f64;
    (per_day * cfg.days_per_month).max(cfg.min_monthly_frequency)
}

fn ceil_days(span: chrono::Duration) -> i64 {
    // Span is non-negative: the first qualifying transaction is <= as_of.
    let ms = span.num_milliseconds();
    if ms % MS_PER_DAY == 0 {
        ms / MS_PER_DAY
    } else {
        ms / MS_PER_DAY + 1
    }
}

//! Daily segment aggregation and the monthly rollup over it.
//!
//! `run_daily` simulates an as-of date sliding over the requested range: for
//! every day it estimates every known user's LTV as of that day, classifies
//! it, and tallies per-segment counts. The naive form of that loop refilters
//! and resorts each user's full history per day; here each user's
//! transactions are sorted once and a cursor advances with the simulated day,
//! keeping a running purchase count, price sum, and first-purchase date. The
//! resulting series is numerically identical to naive recomputation (covered
//! by a property test against `estimate_ltv`).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::estimator::{monthly_frequency, snapshot_instant, LtvConfig, Transaction};
use crate::segment::{classify, Segment, SegmentThresholds};

/// Per-user purchase histories for one batch run. Built fresh per invocation
/// and owned exclusively by it; insertion order is irrelevant.
pub type TransactionHistory = HashMap<String, Vec<Transaction>>;

/// Segment counts for one calendar day. Counts sum to the number of distinct
/// users with at least one transaction on or before `date`; users with no
/// purchases yet are not counted at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySegmentSnapshot {
    pub date: String,
    pub high: u64,
    pub middle: u64,
    pub low: u64,
}

/// Per-month averages of the daily segment counts, rounded half-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySegmentSnapshot {
    pub month: String,
    pub high: u64,
    pub middle: u64,
    pub low: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregationConfig {
    pub ltv: LtvConfig,
    pub thresholds: SegmentThresholds,
}

struct UserCursor<'a> {
    sorted: Vec<&'a Transaction>,
    next: usize,
    count: usize,
    price_sum: f64,
}

impl<'a> UserCursor<'a> {
    fn new(transactions: &'a [Transaction]) -> Self {
        let mut sorted: Vec<&Transaction> = transactions.iter().collect();
        sorted.sort_by_key(|tx| tx.date);
        Self {
            sorted,
            next: 0,
            count: 0,
            price_sum: 0.0,
        }
    }

    /// Folds in every transaction at or before `as_of`, then returns the
    /// user's LTV as of that instant, or `None` while no purchase qualifies.
    fn advance_to(&mut self, as_of: chrono::DateTime<chrono::Utc>, cfg: &LtvConfig) -> Option<f64> {
        while self.next < self.sorted.len() && self.sorted[self.next].date <= as_of {
            self.price_sum += self.sorted[self.next].price;
            self.count += 1;
            self.next += 1;
        }

        if self.count == 0 {
            return None;
        }

        let apv = self.price_sum / self.count as f64;
        let frequency = monthly_frequency(self.count, self.sorted[0].date, as_of, cfg);
        Some(apv * frequency * cfg.lifetime_months)
    }
}

/// Produces one snapshot per calendar day in `[start, end]` inclusive, in
/// chronological order, with no gaps.
///
/// An empty `history` means "no data" and short-circuits to an empty series
/// before any date iteration; a day on which no user has purchased yet still
/// emits a `{0,0,0}` snapshot. `end < start` yields an empty series.
pub fn run_daily(
    history: &TransactionHistory,
    start: NaiveDate,
    end: NaiveDate,
    cfg: &AggregationConfig,
) -> Vec<DailySegmentSnapshot> {
    if history.is_empty() {
        warn!(
            component = "aggregate",
            event = "daily.no_data",
            "no user histories available, returning empty series"
        );
        return Vec::new();
    }

    let mut cursors: Vec<UserCursor> = history.values().map(|txs| UserCursor::new(txs)).collect();

    let mut series = Vec::new();
    let mut day = start;
    while day <= end {
        let as_of = snapshot_instant(day);
        let mut high = 0u64;
        let mut middle = 0u64;
        let mut low = 0u64;

        for cursor in &mut cursors {
            let Some(ltv) = cursor.advance_to(as_of, &cfg.ltv) else {
                continue;
            };
            match classify(ltv, cfg.thresholds) {
                Segment::High => high += 1,
                Segment::Middle => middle += 1,
                Segment::Low => low += 1,
            }
        }

        series.push(DailySegmentSnapshot {
            date: day.format("%Y-%m-%d").to_string(),
            high,
            middle,
            low,
        });

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    info!(
        component = "aggregate",
        event = "daily.finish",
        users = history.len(),
        days = series.len()
    );

    series
}

#[derive(Default)]
struct MonthAccumulator {
    high: u64,
    middle: u64,
    low: u64,
    days: u64,
}

/// Rolls a daily series up into one record per observed calendar month,
/// averaging each segment count across the month's days. Months come out in
/// ascending order; an empty input yields an empty output.
pub fn run_monthly(daily: &[DailySegmentSnapshot]) -> Vec<MonthlySegmentSnapshot> {
    if daily.is_empty() {
        warn!(
            component = "aggregate",
            event = "monthly.no_data",
            "no daily snapshots available, returning empty monthly series"
        );
        return Vec::new();
    }

    let mut months: BTreeMap<String, MonthAccumulator> = BTreeMap::new();
    for snapshot in daily {
        let month = snapshot.date.get(..7).unwrap_or(&snapshot.date).to_string();
        let accumulator = months.entry(month).or_default();
        accumulator.high += snapshot.high;
        accumulator.middle += snapshot.middle;
        accumulator.low += snapshot.low;
        accumulator.days += 1;
    }

    let series: Vec<MonthlySegmentSnapshot> = months
        .into_iter()
        .map(|(month, acc)| MonthlySegmentSnapshot {
            month,
            high: mean_rounded(acc.high, acc.days),
            middle: mean_rounded(acc.middle, acc.days),
            low: mean_rounded(acc.low, acc.days),
        })
        .collect();

    info!(
        component = "aggregate",
        event = "monthly.finish",
        months = series.len()
    );

    series
}

fn mean_rounded(sum: u64, days: u64) -> u64 {
    // days >= 1 by construction: accumulators only exist for observed days.
    (sum as f64 / days as f64).round() as u64
}

//! Batch entry points: ingestion plus aggregation in one call.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::{
    run_daily, run_monthly, AggregationConfig, DailySegmentSnapshot, MonthlySegmentSnapshot,
};
use crate::store::TransactionStore;

/// The fixed full-year reporting window used whenever a caller omits bounds.
pub fn default_batch_range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid default start date"),
        NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid default end date"),
    )
}

/// Range query: fetches the account's history once, then aggregates one
/// snapshot per day over `[start, end]`. Omitted bounds fall back to the
/// default reporting year per bound.
pub fn run_ltv_batch(
    store: &dyn TransactionStore,
    app_id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    cfg: &AggregationConfig,
) -> Vec<DailySegmentSnapshot> {
    let (default_start, default_end) = default_batch_range();
    let start = start.unwrap_or(default_start);
    let end = end.unwrap_or(default_end);

    info!(
        component = "batch",
        event = "ltv_batch.start",
        app_id,
        start = %start,
        end = %end
    );

    let history = store.fetch(app_id);
    run_daily(&history, start, end, cfg)
}

/// Monthly convenience query: rolls the daily series up to one record per
/// month.
///
/// The date arguments are accepted for signature compatibility but NOT
/// honored: the rollup always covers the full default reporting year, so this
/// returns twelve months regardless of the requested sub-range. Callers
/// needing period-scoped output should use [`run_ltv_batch`] plus
/// [`run_monthly`] directly.
pub fn run_monthly_ltv(
    store: &dyn TransactionStore,
    app_id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    cfg: &AggregationConfig,
) -> Vec<MonthlySegmentSnapshot> {
    if start.is_some() || end.is_some() {
        warn!(
            component = "batch",
            event = "monthly_ltv.bounds_ignored",
            app_id,
            "caller-supplied date bounds are discarded; the monthly rollup always covers the default year"
        );
    }

    let daily = run_ltv_batch(store, app_id, None, None, cfg);
    run_monthly(&daily)
}

//! LTV segment aggregation core and its HTTP surface.
//!
//! Pipeline: per-user purchase histories come in through a
//! [`TransactionStore`], [`run_daily`] simulates an as-of date over a
//! calendar range to produce a daily segment-count series, and
//! [`run_monthly`] rolls that series up per calendar month.

mod aggregate;
mod batch;
mod estimator;
mod observability;
mod segment;
mod server;
mod store;

pub use aggregate::{
    run_daily, run_monthly, AggregationConfig, DailySegmentSnapshot, MonthlySegmentSnapshot,
    TransactionHistory,
};
pub use batch::{default_batch_range, run_ltv_batch, run_monthly_ltv};
pub use estimator::{estimate_ltv, snapshot_instant, LtvConfig, Transaction};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_store_selected, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use segment::{classify, Segment, SegmentThresholds};
pub use server::{ltv_router, ChartDataResponse, DateRangeQuery};
pub use store::{
    demo_history, InMemoryTransactionStore, OrdersApiConfig, OrdersApiStore, TransactionStore,
    DEFAULT_ORDERS_API_BASE_URL,
};

//! Transaction ingestion from the upstream orders API.
//!
//! The store boundary is deliberately lossy in one direction: any transport
//! failure, non-2xx status, malformed payload, or upstream rejection is
//! logged and surfaces to the aggregation pipeline as an empty history, never
//! as an error. Downstream callers rely on a well-typed empty collection.

use std::sync::{Arc, RwLock};

use chrono::{TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::TransactionHistory;
use crate::estimator::Transaction;

pub const DEFAULT_ORDERS_API_BASE_URL: &str =
    "https://tjufwmnunr.ap-northeast-1.awsapprunner.com/api/v1";

/// Supplies per-user purchase histories for one account.
pub trait TransactionStore: Send + Sync + 'static {
    fn fetch(&self, app_id: &str) -> TransactionHistory;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdersApiConfig {
    pub base_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OrdersApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORDERS_API_BASE_URL.to_string(),
            http_timeout_ms: 10_000,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderFetchError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("malformed orders payload: {0}")]
    MalformedPayload(String),
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),
}

// Wire shape of the orders endpoint. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct OrdersResponse {
    meta: OrdersMeta,
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrdersMeta {
    is_success: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    order_at: i64,
    customer: OrderCustomer,
    item: OrderItem,
}

#[derive(Debug, Deserialize)]
struct OrderCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OrderItem {
    price: f64,
}

/// Live store backed by the remote orders API.
pub struct OrdersApiStore {
    cfg: OrdersApiConfig,
}

impl OrdersApiStore {
    pub fn new(cfg: OrdersApiConfig) -> Self {
        Self { cfg }
    }

    fn try_fetch(&self, app_id: &str) -> Result<TransactionHistory, OrderFetchError> {
        let fetcher = ReqwestBlockingFetcher::new(self.cfg.http_timeout_ms)?;
        fetch_history_with_fetcher(&fetcher, &self.cfg, app_id)
    }
}

impl TransactionStore for OrdersApiStore {
    fn fetch(&self, app_id: &str) -> TransactionHistory {
        match self.try_fetch(app_id) {
            Ok(history) => history,
            Err(err) => {
                warn!(
                    component = "store",
                    event = "orders.fetch.degraded",
                    app_id,
                    error = %err,
                    "orders fetch failed, continuing with an empty history"
                );
                TransactionHistory::new()
            }
        }
    }
}

pub(crate) fn fetch_history_with_fetcher(
    fetcher: &dyn HttpFetcher,
    cfg: &OrdersApiConfig,
    app_id: &str,
) -> Result<TransactionHistory, OrderFetchError> {
    let url = format!(
        "{}/orders?appId={}&status=completed&sort=desc",
        cfg.base_url, app_id
    );
    debug!(
        component = "store",
        event = "orders.fetch.start",
        app_id,
        url = %url
    );

    let payload = fetch_bytes_with_retry(fetcher, &url, cfg)?;
    let response: OrdersResponse = serde_json::from_slice(&payload)
        .map_err(|err| OrderFetchError::MalformedPayload(err.to_string()))?;

    if !response.meta.is_success {
        let message = if response.meta.message.is_empty() {
            "no failure message supplied".to_string()
        } else {
            response.meta.message
        };
        return Err(OrderFetchError::UpstreamRejected(message));
    }

    let mut history = TransactionHistory::new();
    let mut skipped = 0usize;
    for order in response.orders {
        let Some(date) = Utc.timestamp_millis_opt(order.order_at).single() else {
            skipped += 1;
            continue;
        };

        history
            .entry(order.customer.id.clone())
            .or_default()
            .push(Transaction {
                user_id: order.customer.id,
                price: order.item.price,
                date,
            });
    }

    if skipped > 0 {
        warn!(
            component = "store",
            event = "orders.fetch.skipped_orders",
            app_id,
            skipped,
            "orders with out-of-range timestamps were dropped"
        );
    }

    info!(
        component = "store",
        event = "orders.fetch.finish",
        app_id,
        users = history.len(),
        transactions = history.values().map(Vec::len).sum::<usize>()
    );

    Ok(history)
}

/// In-memory store for tests, the demo server mode, and offline runs.
#[derive(Clone)]
pub struct InMemoryTransactionStore {
    inner: Arc<RwLock<TransactionHistory>>,
}

impl InMemoryTransactionStore {
    pub fn new(history: TransactionHistory) -> Self {
        Self {
            inner: Arc::new(RwLock::new(history)),
        }
    }

    pub fn demo() -> Self {
        Self::new(demo_history())
    }

    pub fn replace_history(&self, history: TransactionHistory) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory history lock should not be poisoned");
        *guard = history;
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn fetch(&self, _app_id: &str) -> TransactionHistory {
        self.inner
            .read()
            .expect("in-memory history lock should not be poisoned")
            .clone()
    }
}

/// Deterministic year of purchases spanning all three segments.
pub fn demo_history() -> TransactionHistory {
    let mut history = TransactionHistory::new();

    let mut push = |user: &str, price: f64, month: u32, day: u32| {
        let date = Utc
            .with_ymd_and_hms(2024, month, day, 0, 0, 0)
            .single()
            .expect("valid demo timestamp");
        history
            .entry(user.to_string())
            .or_default()
            .push(Transaction {
                user_id: user.to_string(),
                price,
                date,
            });
    };

    // Frequent big spender: lands in the high tier all year.
    for month in 1..=12 {
        push("demo-whale", 15_000.0, month, 5);
    }
    // Steady mid-range buyer.
    for month in [1, 4, 7, 10] {
        push("demo-regular", 800.0, month, 12);
    }
    // One small early purchase, then silence.
    push("demo-lapsed", 60.0, 1, 20);
    // Joins mid-year.
    push("demo-late", 2_500.0, 8, 3);

    history
}

pub(crate) trait HttpFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, OrderFetchError>;
}

struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    fn new(timeout_ms: u64) -> Result<Self, OrderFetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| OrderFetchError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, OrderFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| OrderFetchError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrderFetchError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| OrderFetchError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

fn fetch_bytes_with_retry(
    fetcher: &dyn HttpFetcher,
    url: &str,
    cfg: &OrdersApiConfig,
) -> Result<Vec<u8>, OrderFetchError> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher.get_bytes(url) {
            Ok(bytes) => return Ok(bytes),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(_) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(factor);
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

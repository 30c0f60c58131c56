//! HTTP routes over the batch pipeline: the chart-data endpoint plus the
//! debug inspection surface. Handlers only read core outputs; the store fetch
//! and aggregation run on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::aggregate::{run_daily, AggregationConfig, DailySegmentSnapshot, TransactionHistory};
use crate::batch::{default_batch_range, run_ltv_batch};
use crate::store::TransactionStore;

#[derive(Clone)]
struct ServerState {
    store: Arc<dyn TransactionStore>,
    cfg: AggregationConfig,
}

pub fn ltv_router(store: Arc<dyn TransactionStore>, cfg: AggregationConfig) -> Router {
    let state = ServerState { store, cfg };
    Router::new()
        .route("/", get(get_root))
        .route("/api/{app_id}/ltv/chart-data", get(get_chart_data))
        .route("/debug/fetch-data/{app_id}", get(debug_fetch_data))
        .route("/debug/ltv-batch/{app_id}", get(debug_ltv_batch))
        .route("/debug/ltv-batch/{app_id}/full", get(debug_ltv_batch_full))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataResponse {
    pub success: bool,
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub chart_data: Vec<DailySegmentSnapshot>,
}

async fn get_root() -> impl IntoResponse {
    Json(json!({
        "message": "LTV analytics backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_chart_data(
    State(state): State<ServerState>,
    Path(app_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Response {
    info!(
        component = "server",
        event = "http.chart_data.request",
        app_id
    );

    let (start, end) = match parse_range(&query) {
        Ok(range) => range,
        Err(message) => {
            error!(
                component = "server",
                event = "http.chart_data.error",
                app_id,
                error = %message
            );
            return chart_data_failure(&app_id, message);
        }
    };

    match run_batch_blocking(&state, &app_id, start, end).await {
        Ok(chart_data) => Json(ChartDataResponse {
            success: true,
            app_id,
            message: None,
            chart_data,
        })
        .into_response(),
        Err(message) => {
            error!(
                component = "server",
                event = "http.chart_data.error",
                app_id,
                error = %message
            );
            chart_data_failure(&app_id, "An internal server error occurred.".to_string())
        }
    }
}

async fn debug_fetch_data(
    State(state): State<ServerState>,
    Path(app_id): Path<String>,
) -> Response {
    info!(
        component = "server",
        event = "http.debug.fetch_data.request",
        app_id
    );

    let store = Arc::clone(&state.store);
    let id = app_id.clone();
    let joined = tokio::task::spawn_blocking(move || store.fetch(&id)).await;

    let history = match joined {
        Ok(history) => history,
        Err(err) => return debug_failure(&app_id, &err.to_string()),
    };

    Json(json!({
        "success": true,
        "data": {
            "totalUsers": history.len(),
            "totalTransactions": history.values().map(Vec::len).sum::<usize>(),
            "userHistories": history_dump(&history),
        }
    }))
    .into_response()
}

async fn debug_ltv_batch(
    State(state): State<ServerState>,
    Path(app_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Response {
    info!(
        component = "server",
        event = "http.debug.ltv_batch.request",
        app_id
    );

    let (start, end) = match parse_range(&query) {
        Ok(range) => range,
        Err(message) => return debug_failure(&app_id, &message),
    };
    let (default_start, default_end) = default_batch_range();
    let start = start.unwrap_or(default_start);
    let end = end.unwrap_or(default_end);

    let store = Arc::clone(&state.store);
    let cfg = state.cfg;
    let id = app_id.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let history = store.fetch(&id);
        let chart_data = run_daily(&history, start, end, &cfg);
        (history.len(), chart_data)
    })
    .await;

    let (total_unique_users, chart_data) = match joined {
        Ok(outcome) => outcome,
        Err(err) => return debug_failure(&app_id, &err.to_string()),
    };

    let total_days = chart_data.len();
    Json(json!({
        "success": true,
        "data": {
            "appId": app_id,
            "period": {
                "startDate": start.format("%Y-%m-%d").to_string(),
                "endDate": end.format("%Y-%m-%d").to_string(),
                "totalDays": total_days,
            },
            "statistics": {
                "totalUniqueUsers": total_unique_users,
                "averageSegmentCounts": {
                    "high": average_count(&chart_data, |s| s.high),
                    "middle": average_count(&chart_data, |s| s.middle),
                    "low": average_count(&chart_data, |s| s.low),
                },
            },
            "chartData": chart_data.iter().take(10).collect::<Vec<_>>(),
            "totalDataPoints": total_days,
        }
    }))
    .into_response()
}

async fn debug_ltv_batch_full(
    State(state): State<ServerState>,
    Path(app_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Response {
    info!(
        component = "server",
        event = "http.debug.ltv_batch_full.request",
        app_id
    );

    // The full dump defaults to a single month to keep payloads bounded.
    let (default_start, _) = default_batch_range();
    let default_end = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid default end date");

    let start = match parse_optional_date(query.start_date.as_deref()) {
        Ok(parsed) => parsed.unwrap_or(default_start),
        Err(message) => return debug_failure(&app_id, &message),
    };
    let end = match parse_optional_date(query.end_date.as_deref()) {
        Ok(parsed) => parsed.unwrap_or(default_end),
        Err(message) => return debug_failure(&app_id, &message),
    };

    match run_batch_blocking(&state, &app_id, Some(start), Some(end)).await {
        Ok(chart_data) => Json(json!({
            "success": true,
            "data": {
                "appId": app_id,
                "period": {
                    "startDate": start.format("%Y-%m-%d").to_string(),
                    "endDate": end.format("%Y-%m-%d").to_string(),
                },
                "chartData": chart_data,
            }
        }))
        .into_response(),
        Err(message) => debug_failure(&app_id, &message),
    }
}

async fn run_batch_blocking(
    state: &ServerState,
    app_id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<DailySegmentSnapshot>, String> {
    let store = Arc::clone(&state.store);
    let cfg = state.cfg;
    let id = app_id.to_string();

    tokio::task::spawn_blocking(move || run_ltv_batch(store.as_ref(), &id, start, end, &cfg))
        .await
        .map_err(|err| err.to_string())
}

fn parse_range(query: &DateRangeQuery) -> Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let start = parse_optional_date(query.start_date.as_deref())?;
    let end = parse_optional_date(query.end_date.as_deref())?;
    Ok((start, end))
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw {
        None => Ok(None),
        Some(text) => parse_date(text).map(Some),
    }
}

/// Accepts plain calendar dates and full RFC 3339 timestamps (truncated to
/// their calendar day). Anything else is an unparseable date.
fn parse_date(text: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.date_naive());
    }
    Err(format!("unparseable date: {text}"))
}

fn chart_data_failure(app_id: &str, message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ChartDataResponse {
            success: false,
            app_id: app_id.to_string(),
            message: Some(message),
            chart_data: Vec::new(),
        }),
    )
        .into_response()
}

fn debug_failure(app_id: &str, message: &str) -> Response {
    error!(
        component = "server",
        event = "http.debug.error",
        app_id,
        error = %message
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Internal server error",
            "error": message,
        })),
    )
        .into_response()
}

fn history_dump(history: &TransactionHistory) -> Vec<serde_json::Value> {
    let mut users: Vec<&String> = history.keys().collect();
    users.sort();

    users
        .into_iter()
        .map(|user_id| {
            let transactions = &history[user_id];
            json!({
                "userId": user_id,
                "transactionCount": transactions.len(),
                "transactions": transactions
                    .iter()
                    .map(|tx| {
                        json!({
                            "userId": tx.user_id,
                            "price": tx.price,
                            "date": tx.date.to_rfc3339(),
                        })
                    })
                    .collect::<Vec<_>>(),
            })
        })
        .collect()
}

fn average_count(series: &[DailySegmentSnapshot], field: impl Fn(&DailySegmentSnapshot) -> u64) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let sum: u64 = series.iter().map(field).sum();
    let mean = sum as f64 / series.len() as f64;
    (mean * 100.0).round() / 100.0
}

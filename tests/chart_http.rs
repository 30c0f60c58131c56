use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use ltvd::{
    demo_history, ltv_router, AggregationConfig, InMemoryTransactionStore, Transaction,
    TransactionHistory,
};
use tower::util::ServiceExt;

fn tx(user: &str, price: f64, y: i32, m: u32, d: u32) -> Transaction {
    Transaction {
        user_id: user.to_string(),
        price,
        date: Utc
            .with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid test timestamp"),
    }
}

fn app_with_history(history: TransactionHistory) -> axum::Router {
    let store = Arc::new(InMemoryTransactionStore::new(history));
    ltv_router(store, AggregationConfig::default())
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn root_reports_service_and_version() {
    let (status, json) = get_json(app_with_history(TransactionHistory::new()), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("LTV"));
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn chart_data_returns_daily_series_for_explicit_range() {
    let mut history = TransactionHistory::new();
    history.insert("u1".to_string(), vec![tx("u1", 12_000.0, 2024, 3, 10)]);

    let (status, json) = get_json(
        app_with_history(history),
        "/api/app-1/ltv/chart-data?startDate=2024-03-09&endDate=2024-03-11",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["appId"], "app-1");

    let chart = json["chartData"].as_array().unwrap();
    assert_eq!(chart.len(), 3);
    assert_eq!(chart[0]["date"], "2024-03-09");
    // No purchase yet on the 9th: nobody is counted.
    assert_eq!(chart[0]["high"], 0);
    assert_eq!(chart[0]["low"], 0);
    // 12000 * 1 * 12 = 144000 -> high from the purchase day onward.
    assert_eq!(chart[1]["date"], "2024-03-10");
    assert_eq!(chart[1]["high"], 1);
    assert_eq!(chart[2]["high"], 1);
}

#[tokio::test]
async fn chart_data_defaults_to_the_full_year_window() {
    let mut history = TransactionHistory::new();
    history.insert("u1".to_string(), vec![tx("u1", 500.0, 2024, 1, 1)]);

    let (status, json) = get_json(app_with_history(history), "/api/app-1/ltv/chart-data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["chartData"].as_array().unwrap().len(), 366);
}

#[tokio::test]
async fn chart_data_with_no_users_is_success_with_empty_series() {
    let (status, json) = get_json(
        app_with_history(TransactionHistory::new()),
        "/api/app-1/ltv/chart-data",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["chartData"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unparseable_dates_produce_the_500_failure_shape() {
    let (status, json) = get_json(
        app_with_history(demo_history()),
        "/api/app-1/ltv/chart-data?startDate=yesterday",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["appId"], "app-1");
    assert!(json["message"].is_string());
    assert_eq!(json["chartData"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn inverted_range_is_an_empty_series_not_an_error() {
    let (status, json) = get_json(
        app_with_history(demo_history()),
        "/api/app-1/ltv/chart-data?startDate=2024-06-01&endDate=2024-05-01",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["chartData"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn debug_fetch_data_dumps_the_raw_history() {
    let mut history = TransactionHistory::new();
    history.insert(
        "u1".to_string(),
        vec![tx("u1", 100.0, 2024, 1, 1), tx("u1", 200.0, 2024, 2, 1)],
    );
    history.insert("u2".to_string(), vec![tx("u2", 50.0, 2024, 1, 5)]);

    let (status, json) = get_json(app_with_history(history), "/debug/fetch-data/app-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["totalUsers"], 2);
    assert_eq!(json["data"]["totalTransactions"], 3);

    let users = json["data"]["userHistories"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["userId"], "u1");
    assert_eq!(users[0]["transactionCount"], 2);
    assert_eq!(users[0]["transactions"][0]["price"], 100.0);
}

#[tokio::test]
async fn debug_ltv_batch_reports_statistics_and_a_preview() {
    let mut history = TransactionHistory::new();
    history.insert("u1".to_string(), vec![tx("u1", 12_000.0, 2024, 1, 1)]);

    let (status, json) = get_json(
        app_with_history(history),
        "/debug/ltv-batch/app-1?startDate=2024-01-01&endDate=2024-01-31",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let data = &json["data"];
    assert_eq!(data["appId"], "app-1");
    assert_eq!(data["period"]["totalDays"], 31);
    assert_eq!(data["statistics"]["totalUniqueUsers"], 1);
    // One high user on every one of the 31 days.
    assert_eq!(data["statistics"]["averageSegmentCounts"]["high"], 1.0);
    assert_eq!(data["chartData"].as_array().unwrap().len(), 10);
    assert_eq!(data["totalDataPoints"], 31);
}

#[tokio::test]
async fn debug_ltv_batch_defaults_to_the_full_year() {
    let (status, json) = get_json(app_with_history(demo_history()), "/debug/ltv-batch/app-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let data = &json["data"];
    assert_eq!(data["period"]["startDate"], "2024-01-01");
    assert_eq!(data["period"]["endDate"], "2024-12-31");
    assert_eq!(data["period"]["totalDays"], 366);
    assert_eq!(data["totalDataPoints"], 366);
    assert_eq!(data["chartData"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn debug_full_dump_defaults_to_one_month() {
    let (status, json) = get_json(
        app_with_history(demo_history()),
        "/debug/ltv-batch/app-1/full",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["period"]["startDate"], "2024-01-01");
    assert_eq!(data["period"]["endDate"], "2024-01-31");
    assert_eq!(data["chartData"].as_array().unwrap().len(), 31);
}

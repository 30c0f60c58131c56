use std::io;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ltvd::{
    demo_history, log_app_bind, log_app_start, log_store_selected, ltv_router, run_daily,
    run_monthly_ltv, AggregationConfig, InMemoryTransactionStore, LoggingConfig,
    TransactionHistory,
};
use tower::util::ServiceExt;
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

#[test]
fn server_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = LoggingConfig::default();
        log_app_start(&cfg);
        log_store_selected("demo", Some("LTVD_USE_DEMO"));
        log_app_bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000));
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"store.selected\""));
    assert!(logs.contains("\"event\":\"app.bind\""));
}

#[test]
fn empty_history_aggregation_logs_a_no_data_warning() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = AggregationConfig::default();
        let series = run_daily(
            &TransactionHistory::new(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            &cfg,
        );
        assert!(series.is_empty());
    });

    assert!(logs.contains("\"event\":\"daily.no_data\""));
}

#[test]
fn monthly_query_logs_when_caller_bounds_are_discarded() {
    let logs = capture_logs(Level::INFO, || {
        let store = InMemoryTransactionStore::demo();
        let cfg = AggregationConfig::default();
        let monthly = run_monthly_ltv(
            &store,
            "app-1",
            Some(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            None,
            &cfg,
        );
        assert_eq!(monthly.len(), 12);
    });

    assert!(logs.contains("\"event\":\"monthly_ltv.bounds_ignored\""));
    assert!(logs.contains("\"event\":\"ltv_batch.start\""));
    assert!(logs.contains("\"event\":\"monthly.finish\""));
}

#[test]
fn chart_data_route_emits_request_event() {
    let logs = capture_logs(Level::INFO, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("single-thread runtime should build");

        rt.block_on(async {
            let store = Arc::new(InMemoryTransactionStore::new(demo_history()));
            let app = ltv_router(store, AggregationConfig::default());

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/app-1/ltv/chart-data?startDate=2024-01-01&endDate=2024-01-03")
                        .body(Body::empty())
                        .expect("request should build"),
                )
                .await
                .expect("chart-data request should succeed");

            assert_eq!(response.status(), StatusCode::OK);
        });
    });

    assert!(logs.contains("\"event\":\"http.chart_data.request\""));
}

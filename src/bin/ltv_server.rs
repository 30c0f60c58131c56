use std::{net::SocketAddr, sync::Arc};

use ltvd::{
    init_logging, log_app_bind, log_app_start, log_store_selected, ltv_router, AggregationConfig,
    InMemoryTransactionStore, LoggingConfig, OrdersApiConfig, OrdersApiStore, TransactionStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = LoggingConfig::from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("LTVD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;

    let store = store_from_env();
    let app = ltv_router(store, AggregationConfig::default());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn store_from_env() -> Arc<dyn TransactionStore> {
    let force_demo = std::env::var("LTVD_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_store_selected("demo", Some("LTVD_USE_DEMO"));
        return Arc::new(InMemoryTransactionStore::demo());
    }

    let mut cfg = OrdersApiConfig::default();
    if let Ok(base_url) = std::env::var("LTVD_ORDERS_API_URL") {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            cfg.base_url = trimmed.to_string();
        }
    }

    log_store_selected("orders_api", None);
    Arc::new(OrdersApiStore::new(cfg))
}

//! Logging configuration and server lifecycle events.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Reads `LTVD_LOG_LEVEL`, `LTVD_LOG_FORMAT` (`json`/`pretty`), and
    /// `LTVD_LOG_TARGET`. Unset or unparseable values keep the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = env::var("LTVD_LOG_LEVEL") {
            let trimmed = level.trim();
            if !trimmed.is_empty() {
                config.level = trimmed.to_string();
            }
        }

        if let Ok(format) = env::var("LTVD_LOG_FORMAT") {
            match format.trim().to_ascii_lowercase().as_str() {
                "json" => config.format = LogFormat::Json,
                "pretty" => config.format = LogFormat::Pretty,
                _ => {}
            }
        }

        if let Ok(include_target) = env::var("LTVD_LOG_TARGET") {
            match include_target.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.include_target = true,
                "0" | "false" | "no" | "off" => config.include_target = false,
                _ => {}
            }
        }

        config
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "ltv_server",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "ltv_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        route = "/api/{app_id}/ltv/chart-data"
    );
}

pub fn log_store_selected(store: &str, reason: Option<&str>) {
    match reason {
        Some(reason) => info!(
            component = "ltv_server",
            event = "store.selected",
            store,
            reason
        ),
        None => info!(component = "ltv_server", event = "store.selected", store),
    }
}

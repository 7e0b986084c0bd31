//! # Structured Logging Module
//!
//! Console logging through `tracing-subscriber`, human-readable by default and JSON
//! when configured. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use crate::state_machine::OrderStatus;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Only the first call has any effect.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if a global subscriber is already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Log structured data for order lifecycle operations
pub fn log_order_operation(
    operation: &str,
    order_id: &str,
    status: OrderStatus,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_id = %order_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ORDER_OPERATION"
    );
}

/// Log structured data for callback token operations
pub fn log_callback_operation(operation: &str, order_id: &str, step: &str, status: &str) {
    tracing::info!(
        operation = %operation,
        order_id = %order_id,
        step = %step,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "CALLBACK_OPERATION"
    );
}

/// Log structured data for subscriber fanout
pub fn log_fanout_operation(tenant_id: &str, sent: usize, failed: usize, evicted: usize) {
    tracing::info!(
        tenant_id = %tenant_id,
        sent = sent,
        failed = failed,
        evicted = evicted,
        timestamp = %Utc::now().to_rfc3339(),
        "FANOUT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: true,
        };
        init_structured_logging(&config);
        init_structured_logging(&config);
        log_order_operation("create", "O1", OrderStatus::Received, None);
        log_error("test", "init", "none", Some("ctx"));
    }
}

//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Human-readable console output
//! - JSON-formatted file logs with rotation
//! - `RUST_LOG` overrides through `EnvFilter`
//!
//! # Example
//!
//! ```no_run
//! use tidemark::logging::init_logging;
//! use tidemark::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(entity = "orders", "Sync started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an entity sync
///
/// # Example
///
/// ```no_run
/// use tidemark::log_entity_start;
///
/// log_entity_start!("orders", "2025-01-01T00:00:00", "2025-01-10T00:00:00");
/// ```
#[macro_export]
macro_rules! log_entity_start {
    ($entity:expr, $start:expr, $end:expr) => {
        tracing::info!(
            entity = %$entity,
            start = %$start,
            end = %$end,
            "Syncing entity"
        );
    };
}

/// Log the completion of an entity sync
///
/// # Example
///
/// ```no_run
/// use tidemark::log_entity_complete;
/// use std::time::Duration;
///
/// log_entity_complete!("orders", 42, Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_entity_complete {
    ($entity:expr, $rows:expr, $duration:expr) => {
        tracing::info!(
            entity = %$entity,
            rows = $rows,
            duration_ms = $duration.as_millis() as u64,
            "Entity synced"
        );
    };
}

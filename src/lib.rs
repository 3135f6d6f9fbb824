// Tidemark - Incremental PostgreSQL to CSV Sync
// Copyright (c) 2025 Tidemark Contributors
// Licensed under the MIT License

//! # Tidemark - Incremental PostgreSQL to CSV Sync
//!
//! Tidemark extracts rows that changed since the last run from a PostgreSQL
//! database into CSV files, one file per entity per run, for downstream
//! warehouse loading. Progress is tracked with a per-entity watermark.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Tracking** a last-synced timestamp per entity in a JSON state file,
//!   optionally mirrored to S3
//! - **Querying** each entity with its own SQL template bound to the window
//!   `[startDate, tillDate]`
//! - **Writing** CSV output locally or uploading it to S3-compatible storage
//! - **Committing** the window end as the new watermark only after delivery
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (state, templates, sinks, sync orchestration)
//! - [`adapters`] - External integrations (PostgreSQL, S3)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidemark::adapters::postgresql::PostgresSource;
//! use tidemark::config::TidemarkConfig;
//! use tidemark::core::sink::Destination;
//! use tidemark::core::state::WatermarkStore;
//! use tidemark::core::sync::SyncCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TidemarkConfig::from_file("tidemark.toml")?;
//!
//!     let source = Arc::new(PostgresSource::new(&config.source)?);
//!     let state = Arc::new(WatermarkStore::load(&config.sync.state_file, None).await?);
//!     let destination = Destination::local(&config.sync.export_dir);
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!
//!     let run = SyncCoordinator::new(&config.sync, source, state, destination, shutdown)
//!         .execute_sync()
//!         .await?;
//!
//!     println!("Synced {} entities, {} rows", run.success, run.total_rows());
//!     Ok(())
//! }
//! ```
//!
//! ## Incremental Sync
//!
//! Each run captures one window end. An entity's window starts at its
//! watermark, or `default_lookback_days` before the end if it was never
//! synced. After the entity's output is delivered the end becomes its new
//! watermark, so the next run picks up exactly where this one stopped:
//!
//! ```rust,no_run
//! use tidemark::core::state::WatermarkStore;
//! use tidemark::domain::SyncTimestamp;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = WatermarkStore::load("state.json", None).await?;
//!
//! let end = SyncTimestamp::parse("2025-01-10T00:00:00")?;
//! store.update_timestamp("orders", end).await?;
//!
//! let orders = store.find("orders").await;
//! assert_eq!(orders.and_then(|w| w.last_sync_time), Some(end));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Tidemark uses the [`domain::SyncError`] type for all errors:
//!
//! ```rust,no_run
//! use tidemark::domain::SyncError;
//!
//! fn example() -> Result<(), SyncError> {
//!     let config = tidemark::config::TidemarkConfig::from_file("tidemark.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Tidemark uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! tracing::info!(entity = "orders", rows = 42, "Entity synced");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

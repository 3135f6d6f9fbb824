//! Core business logic for Tidemark.
//!
//! # Modules
//!
//! - [`state`] - Watermark store with atomic persistence and remote mirror
//! - [`template`] - Per-entity query templates
//! - [`sink`] - CSV serialization to local files or remote objects
//! - [`sync`] - Run orchestration
//!
//! # Sync Workflow
//!
//! 1. **Load State**: Read watermarks (remote mirror first, then local file)
//! 2. **Capture Window End**: One timestamp shared by every entity
//! 3. **Query**: Run `<sql_dir>/<entity>.sql` with `startDate` / `tillDate`
//! 4. **Write**: Stream rows into a CSV sink
//! 5. **Commit**: Persist the window end as the entity's watermark
//! 6. **Report**: Aggregate a run result
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidemark::adapters::postgresql::PostgresSource;
//! use tidemark::config::load_config;
//! use tidemark::core::sink::Destination;
//! use tidemark::core::state::WatermarkStore;
//! use tidemark::core::sync::SyncCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tidemark.toml")?;
//! let source = Arc::new(PostgresSource::new(&config.source)?);
//! let state = Arc::new(WatermarkStore::load(&config.sync.state_file, None).await?);
//! let destination = Destination::local(&config.sync.export_dir);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = SyncCoordinator::new(&config.sync, source, state, destination, shutdown_rx);
//!
//! let run = coordinator.execute_sync().await?;
//! println!("Succeeded: {}, failed: {}", run.success, run.failed);
//! # Ok(())
//! # }
//! ```

pub mod sink;
pub mod state;
pub mod sync;
pub mod template;

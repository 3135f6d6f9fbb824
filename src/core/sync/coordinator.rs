//! Sync coordinator - main orchestrator for an incremental run
//!
//! One run captures a single window end, then walks the active entities in
//! name order. For each entity the coordinator loads its query template,
//! streams the query's rows through a sink, and commits the window end as
//! the new watermark once the output has been delivered.

use super::cancel::RunGuard;
use super::result::{EntityResult, RunResult, SetupFailure};
use super::window::RunWindow;
use crate::adapters::source::{RowCursor, RowSource};
use crate::config::{FailurePolicy, SyncConfig};
use crate::core::sink::{Delivery, Destination, Sink};
use crate::core::state::{EntityWatermark, WatermarkStore};
use crate::core::template::TemplateStore;
use crate::domain::{Result, SyncError, SyncTimestamp};
use crate::{log_entity_complete, log_entity_start};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Rows between progress log lines
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Sync coordinator
pub struct SyncCoordinator {
    source: Arc<dyn RowSource>,
    state: Arc<WatermarkStore>,
    destination: Destination,
    templates: TemplateStore,
    lookback_days: u32,
    failure_policy: FailurePolicy,
    run_timeout: Option<Duration>,
    entity_filter: Option<Vec<String>>,
    shutdown: watch::Receiver<bool>,
}

impl SyncCoordinator {
    /// Create a new sync coordinator
    ///
    /// # Arguments
    ///
    /// * `sync` - Template directory, lookback and failure policy
    /// * `source` - Row source every entity query runs against
    /// * `state` - Loaded watermark store
    /// * `destination` - Where outputs are written
    /// * `shutdown` - Flips to `true` when the run should stop
    pub fn new(
        sync: &SyncConfig,
        source: Arc<dyn RowSource>,
        state: Arc<WatermarkStore>,
        destination: Destination,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            state,
            destination,
            templates: TemplateStore::new(&sync.sql_dir),
            lookback_days: sync.default_lookback_days,
            failure_policy: sync.failure_policy,
            run_timeout: None,
            entity_filter: None,
            shutdown,
        }
    }

    /// Bounds the whole streaming phase of a run
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Restricts runs to the named active entities
    pub fn with_entities(mut self, names: Vec<String>) -> Self {
        self.entity_filter = Some(names);
        self
    }

    /// Overrides the lookback for never-synced entities
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Execute a run ending now
    ///
    /// # Errors
    ///
    /// See [`SyncCoordinator::execute_sync_at`].
    pub async fn execute_sync(&self) -> Result<RunResult> {
        self.execute_sync_at(SyncTimestamp::now()).await
    }

    /// Execute a run ending at `end`
    ///
    /// Entity failures are recorded in the returned [`RunResult`]; with
    /// [`FailurePolicy::StopOnFirstFailure`] the first one ends the run.
    /// Shutdown or the run deadline ends the run regardless of policy.
    ///
    /// An entity filter naming an inactive entity, or a source that does not
    /// answer, yields a fatal result with nothing attempted.
    pub async fn execute_sync_at(&self, end: SyncTimestamp) -> Result<RunResult> {
        let started = Instant::now();
        let guard = RunGuard::new(self.shutdown.clone(), self.run_timeout);

        let entities = match self.select_entities().await {
            Ok(entities) => entities,
            Err(e) => return Ok(self.setup_failed(0, end, started, &e)),
        };
        let total = entities.len();

        if let Err(e) = guard.guard("source check", self.source.ping()).await {
            if e.is_interruption() {
                tracing::info!(error = %e, "Run interrupted before the first entity");
                let run = RunResult::from_entities(Vec::new(), total, end, started.elapsed(), true);
                run.log_summary();
                return Ok(run);
            }
            let e = e.context(format!("source {}", self.source.describe()));
            return Ok(self.setup_failed(total, end, started, &e));
        }

        tracing::info!(
            entities = total,
            window_end = %end,
            destination = self.destination.kind(),
            failure_policy = %self.failure_policy,
            "Starting sync run"
        );

        let mut results = Vec::with_capacity(total);
        let mut interrupted = false;

        for watermark in &entities {
            if guard.is_cancelled() {
                tracing::info!(entity = %watermark.name, "Shutdown requested; not starting entity");
                interrupted = true;
                break;
            }

            let (result, cut_short) = self.sync_entity(watermark, end, &guard).await;
            let failed = !result.success;
            results.push(result);

            if cut_short {
                interrupted = true;
                break;
            }
            if failed && self.failure_policy == FailurePolicy::StopOnFirstFailure {
                tracing::warn!(entity = %watermark.name, "Stopping run after entity failure");
                break;
            }
        }

        let run = RunResult::from_entities(results, total, end, started.elapsed(), interrupted);
        run.log_summary();
        Ok(run)
    }

    fn setup_failed(
        &self,
        total: usize,
        end: SyncTimestamp,
        started: Instant,
        error: &SyncError,
    ) -> RunResult {
        tracing::error!(error = %error, "Sync run could not start");
        RunResult::fatal(total, end, started.elapsed(), SetupFailure::from_error(error))
    }

    async fn select_entities(&self) -> Result<Vec<EntityWatermark>> {
        let active = self.state.active().await;

        let Some(ref filter) = self.entity_filter else {
            return Ok(active);
        };

        let unknown: Vec<&str> = filter
            .iter()
            .filter(|name| !active.iter().any(|e| &e.name == *name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(SyncError::Configuration(format!(
                "not active entities: {}",
                unknown.join(", ")
            )));
        }

        Ok(active
            .into_iter()
            .filter(|e| filter.contains(&e.name))
            .collect())
    }

    /// Syncs one entity; the flag is true when shutdown or the deadline hit
    async fn sync_entity(
        &self,
        watermark: &EntityWatermark,
        end: SyncTimestamp,
        guard: &RunGuard,
    ) -> (EntityResult, bool) {
        let started = Instant::now();
        let name = watermark.name.as_str();
        let window = RunWindow::for_entity(watermark, end, self.lookback_days);
        log_entity_start!(name, window.start, window.end);

        let mut rows = 0u64;
        let delivery = match self.extract(name, window, guard, &mut rows).await {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(entity = %name, rows, error = %e, "Entity sync failed");
                let cut_short = e.is_interruption();
                let result = EntityResult::failed(name, window, rows, e.to_string(), started.elapsed());
                return (result, cut_short);
            }
        };

        let mirror_warning = match self.state.update_timestamp(name, end).await {
            Ok(warning) => warning,
            Err(e) => {
                let e = e.context("commit watermark");
                tracing::error!(
                    entity = %name,
                    output = delivery.location().as_deref().unwrap_or("none"),
                    error = %e,
                    "Watermark commit failed; output was delivered"
                );
                let result = EntityResult::failed(name, window, rows, e.to_string(), started.elapsed())
                    .with_output_location(delivery.location());
                return (result, false);
            }
        };

        let duration = started.elapsed();
        log_entity_complete!(name, rows, duration);

        let mut result = EntityResult::succeeded(name, window, rows, delivery.location(), duration);
        if let Some(warning) = delivery.warning() {
            result = result.with_warning(warning);
        }
        if let Some(warning) = mirror_warning {
            result = result.with_warning(warning.to_string());
        }
        (result, false)
    }

    /// Runs the entity's query and delivers its output
    async fn extract(
        &self,
        name: &str,
        window: RunWindow,
        guard: &RunGuard,
        rows: &mut u64,
    ) -> Result<Delivery> {
        let query = self.templates.load(name).await?;
        let params = window.params();

        let mut cursor = guard
            .guard("query execution", async {
                self.source
                    .execute(&query, &params)
                    .await
                    .map_err(|e| e.context("execute query"))
            })
            .await?;

        let delivered = self.write_output(name, window, cursor.as_mut(), guard, rows).await;

        if let Err(e) = cursor.close().await {
            tracing::warn!(entity = %name, error = %e, "Failed to close cursor");
        }
        delivered
    }

    async fn write_output(
        &self,
        name: &str,
        window: RunWindow,
        cursor: &mut dyn RowCursor,
        guard: &RunGuard,
        rows: &mut u64,
    ) -> Result<Delivery> {
        let mut sink = self.destination.open(name, window.start)?;

        if let Err(e) = stream_rows(name, cursor, sink.as_mut(), guard, rows).await {
            if let Err(abort_err) = sink.abort().await {
                tracing::warn!(entity = %name, error = %abort_err, "Failed to discard partial output");
            }
            return Err(e);
        }

        if sink.remove().await? {
            tracing::info!(entity = %name, "No changed rows; no output written");
            return Ok(Delivery::Discarded);
        }

        let local = sink.local_path().to_path_buf();
        match guard.guard("output close", sink.close()).await {
            Ok(delivery) => Ok(delivery),
            Err(e) => {
                // Dropping the close future closed the file; remove what is left
                match tokio::fs::remove_file(&local).await {
                    Ok(()) => {}
                    Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                    Err(rm) => tracing::warn!(
                        path = %local.display(),
                        error = %rm,
                        "Failed to remove partial output"
                    ),
                }
                Err(e)
            }
        }
    }
}

/// Copies every row from the cursor into the sink
async fn stream_rows(
    name: &str,
    cursor: &mut dyn RowCursor,
    sink: &mut dyn Sink,
    guard: &RunGuard,
    rows: &mut u64,
) -> Result<()> {
    sink.write_headers(cursor.column_names())?;

    while guard.guard("row fetch", cursor.next()).await? {
        let buffer = sink
            .row_buffer()
            .ok_or_else(|| SyncError::Sink("output already discarded".to_string()))?;
        cursor.scan(buffer)?;
        sink.write_buffered_row()?;
        *rows += 1;

        if *rows % PROGRESS_INTERVAL == 0 {
            tracing::debug!(entity = %name, rows = *rows, "Rows written");
        }
    }

    guard.guard("output flush", sink.flush()).await
}

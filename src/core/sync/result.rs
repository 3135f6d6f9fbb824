//! Per-entity and per-run outcomes

use super::window::RunWindow;
use crate::domain::{SyncError, SyncTimestamp};
use serde::Serialize;
use std::time::Duration;

/// Outcome of syncing one entity
#[derive(Debug, Clone, Serialize)]
pub struct EntityResult {
    /// Entity name
    pub entity: String,

    /// True when rows were delivered and the watermark committed
    pub success: bool,

    /// Data rows written (header excluded)
    pub row_count: u64,

    /// Where the output went; `None` when nothing was delivered
    pub output_location: Option<String>,

    /// Failure cause
    pub error: Option<String>,

    /// Wall time spent on the entity
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Window the entity was synced over
    pub window: RunWindow,

    /// Non-fatal problems (mirror push, upload fallback)
    pub warnings: Vec<String>,
}

impl EntityResult {
    /// Successful result
    pub fn succeeded(
        entity: impl Into<String>,
        window: RunWindow,
        row_count: u64,
        output_location: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            entity: entity.into(),
            success: true,
            row_count,
            output_location,
            error: None,
            duration,
            window,
            warnings: Vec::new(),
        }
    }

    /// Failed result; `row_count` is what was streamed before the failure
    pub fn failed(
        entity: impl Into<String>,
        window: RunWindow,
        row_count: u64,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            entity: entity.into(),
            success: false,
            row_count,
            output_location: None,
            error: Some(error.into()),
            duration,
            window,
            warnings: Vec::new(),
        }
    }

    /// Records where delivered output went
    pub fn with_output_location(mut self, location: Option<String>) -> Self {
        self.output_location = location;
        self
    }

    /// Attaches a warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// How a run ended, for the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every selected entity succeeded
    Success,
    /// An entity failed or the run was interrupted; earlier commits stand
    PartialFailure,
    /// Setup failed before any entity was attempted
    Fatal,
}

/// Class of a setup failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupFailureKind {
    /// Bad entity selection or other configuration problem
    Configuration,
    /// Row source unreachable
    Connectivity,
}

/// Why a run never reached its first entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupFailure {
    pub kind: SetupFailureKind,
    pub message: String,
}

impl SetupFailure {
    /// Classifies a setup error
    pub fn from_error(error: &SyncError) -> Self {
        let kind = if error.is_connectivity() {
            SetupFailureKind::Connectivity
        } else {
            SetupFailureKind::Configuration
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Per-entity outcomes in processing order
    pub entities: Vec<EntityResult>,

    /// Entities selected for the run
    pub total: usize,

    /// Entities attempted
    pub processed: usize,

    /// Entities that succeeded
    pub success: usize,

    /// Entities that failed
    pub failed: usize,

    /// Entities never attempted because the run stopped early
    pub skipped: usize,

    /// Wall time of the whole run
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Window end shared by every entity
    pub window_end: SyncTimestamp,

    /// True if shutdown or the deadline stopped the run
    pub interrupted: bool,

    /// Set when the run failed before attempting any entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_failure: Option<SetupFailure>,
}

impl RunResult {
    /// Builds the aggregate from per-entity results
    pub fn from_entities(
        entities: Vec<EntityResult>,
        total: usize,
        window_end: SyncTimestamp,
        duration: Duration,
        interrupted: bool,
    ) -> Self {
        let processed = entities.len();
        let success = entities.iter().filter(|e| e.success).count();
        Self {
            total,
            processed,
            success,
            failed: processed - success,
            skipped: total.saturating_sub(processed),
            duration,
            window_end,
            interrupted,
            setup_failure: None,
            entities,
        }
    }

    /// Result of a run that failed during setup; nothing was attempted
    pub fn fatal(
        total: usize,
        window_end: SyncTimestamp,
        duration: Duration,
        failure: SetupFailure,
    ) -> Self {
        Self {
            setup_failure: Some(failure),
            ..Self::from_entities(Vec::new(), total, window_end, duration, false)
        }
    }

    /// True when every selected entity was synced
    pub fn is_successful(&self) -> bool {
        self.outcome() == RunOutcome::Success
    }

    /// Three-way classification of the run
    ///
    /// An interrupted run is a partial failure: entities committed before the
    /// interruption keep their watermarks.
    pub fn outcome(&self) -> RunOutcome {
        if self.setup_failure.is_some() {
            RunOutcome::Fatal
        } else if self.failed > 0 || self.interrupted {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Success
        }
    }

    /// Total data rows across entities
    pub fn total_rows(&self) -> u64 {
        self.entities.iter().map(|e| e.row_count).sum()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            processed = self.processed,
            success = self.success,
            failed = self.failed,
            skipped = self.skipped,
            rows = self.total_rows(),
            window_end = %self.window_end,
            duration_secs = self.duration.as_secs_f64(),
            "Sync completed"
        );

        for result in self.entities.iter().filter(|e| !e.success) {
            tracing::warn!(
                entity = %result.entity,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Entity failed"
            );
        }
        for result in &self.entities {
            for warning in &result.warnings {
                tracing::warn!(entity = %result.entity, warning = %warning, "Entity warning");
            }
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

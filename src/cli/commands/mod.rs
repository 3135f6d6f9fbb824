//! CLI command implementations
//!
//! This module contains all CLI command implementations plus the pieces they
//! share: exit codes and construction of the runtime components from a
//! loaded configuration.

pub mod export;
pub mod init;
pub mod status;
pub mod validate;

use crate::adapters::blob::{BlobStore, S3BlobStore};
use crate::config::TidemarkConfig;
use crate::core::sink::Destination;
use crate::core::state::{StateMirror, WatermarkStore};
use crate::core::sync::{RunOutcome, RunResult, SetupFailureKind};
use crate::domain::{Result, SyncError};
use std::sync::Arc;

/// Run completed and every entity succeeded
pub const EXIT_SUCCESS: i32 = 0;
/// Run completed with at least one failed entity
pub const EXIT_PARTIAL_FAILURE: i32 = 1;
/// Configuration, state file or template problem
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Source or remote storage unreachable
pub const EXIT_CONNECTION_ERROR: i32 = 4;
/// Anything else
pub const EXIT_FATAL_ERROR: i32 = 5;
/// Stopped by SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for an error raised before or instead of a run
pub fn exit_code_for(error: &SyncError) -> i32 {
    if error.is_connectivity() {
        return EXIT_CONNECTION_ERROR;
    }
    if error.is_interruption() {
        return EXIT_INTERRUPTED;
    }
    match error.root() {
        SyncError::Configuration(_)
        | SyncError::Validation(_)
        | SyncError::Template(_)
        | SyncError::State(_) => EXIT_CONFIG_ERROR,
        _ => EXIT_FATAL_ERROR,
    }
}

/// Exit code for a finished run
///
/// `signalled` tells a shutdown request apart from the run deadline when the
/// run was interrupted.
pub fn exit_code_for_run(run: &RunResult, signalled: bool) -> i32 {
    if let Some(ref failure) = run.setup_failure {
        return match failure.kind {
            SetupFailureKind::Configuration => EXIT_CONFIG_ERROR,
            SetupFailureKind::Connectivity => EXIT_CONNECTION_ERROR,
        };
    }
    if run.interrupted {
        return if signalled {
            EXIT_INTERRUPTED
        } else {
            EXIT_FATAL_ERROR
        };
    }
    match run.outcome() {
        RunOutcome::Success => EXIT_SUCCESS,
        _ => EXIT_PARTIAL_FAILURE,
    }
}

/// Builds the remote store when `[remote]` is configured
pub(crate) async fn remote_store(config: &TidemarkConfig) -> Result<Option<Arc<dyn BlobStore>>> {
    match config.remote {
        Some(ref remote) => {
            let store = S3BlobStore::new(remote).await?;
            Ok(Some(Arc::new(store)))
        }
        None => Ok(None),
    }
}

/// Checks write access to the remote store, if there is one
///
/// # Errors
///
/// Returns `SyncError::Connection` when the store cannot be written.
pub(crate) async fn check_remote(remote: Option<&Arc<dyn BlobStore>>) -> Result<()> {
    let Some(store) = remote else {
        return Ok(());
    };
    store.check_connection().await.map_err(|e| {
        if e.is_connectivity() {
            e
        } else {
            SyncError::Connection(format!("remote storage unreachable: {e}"))
        }
    })
}

/// Loads the watermark store, mirrored when a remote store is given
pub(crate) async fn load_state(
    config: &TidemarkConfig,
    remote: Option<&Arc<dyn BlobStore>>,
) -> Result<WatermarkStore> {
    let mirror = match (remote, config.remote.as_ref()) {
        (Some(store), Some(remote_cfg)) => {
            Some(StateMirror::new(Arc::clone(store), remote_cfg.state_key()))
        }
        _ => None,
    };
    WatermarkStore::load(&config.sync.state_file, mirror).await
}

/// Output destination for the configuration
pub(crate) fn destination(
    config: &TidemarkConfig,
    remote: Option<&Arc<dyn BlobStore>>,
) -> Destination {
    match (remote, config.remote.as_ref()) {
        (Some(store), Some(remote_cfg)) => Destination::remote(
            &config.sync.export_dir,
            remote_cfg.normalized_prefix(),
            Arc::clone(store),
        ),
        _ => Destination::local(&config.sync.export_dir),
    }
}

/// Splits a comma-separated CLI list, dropping blanks
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

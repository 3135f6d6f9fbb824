//! Output file and object naming
//!
//! Outputs are named after the entity and the window start, so each window
//! maps to exactly one artifact.

use crate::domain::SyncTimestamp;
use std::path::{Path, PathBuf};

/// `<entity>__<start>.csv`, with `:` in the start replaced by `-`
pub fn output_file_name(entity: &str, start: SyncTimestamp) -> String {
    format!("{entity}__{}.csv", start.file_token())
}

/// Local output (or staging) path under the export directory
pub fn local_path(export_dir: &Path, entity: &str, start: SyncTimestamp) -> PathBuf {
    export_dir.join(output_file_name(entity, start))
}

/// Remote object key: `<prefix><entity>/<entity>__<start>.csv`
///
/// `prefix` must already be normalized (empty, or ending in `/`).
pub fn remote_key(prefix: &str, entity: &str, start: SyncTimestamp) -> String {
    format!("{prefix}{entity}/{}", output_file_name(entity, start))
}

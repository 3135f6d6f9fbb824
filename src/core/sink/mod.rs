//! CSV output sinks
//!
//! A sink receives one entity's rows for one window. Both variants write the
//! same CSV through [`serializer::CsvOutput`]; they differ only in where the
//! finished file ends up:
//!
//! - [`local::LocalSink`] writes directly to `<export_dir>/<entity>__<start>.csv`
//! - [`remote::RemoteSink`] stages at the same path, uploads to
//!   `<prefix><entity>/<entity>__<start>.csv`, and removes the staging file
//!
//! # Lifecycle
//!
//! `write_headers` → (`row_buffer` + `write_buffered_row`)* → `flush` →
//! `remove` (drops an empty output) → `close`. `abort` discards the output
//! on failure regardless of row count.

pub mod local;
pub mod naming;
pub mod remote;
pub mod serializer;

pub use local::LocalSink;
pub use remote::RemoteSink;
pub use serializer::CsvOutput;

use crate::adapters::blob::BlobStore;
use crate::adapters::source::RowBuffer;
use crate::domain::{Result, SyncTimestamp};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a closed sink's output went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Final file in the export directory
    Local { path: PathBuf },

    /// Uploaded to remote storage
    Uploaded { location: String },

    /// Upload failed; the staging file is the recoverable output
    StagedLocally { path: PathBuf, upload_error: String },

    /// Nothing was produced (empty or aborted output)
    Discarded,
}

impl Delivery {
    /// Human-readable location of the artifact, if any
    pub fn location(&self) -> Option<String> {
        match self {
            Delivery::Local { path } | Delivery::StagedLocally { path, .. } => {
                Some(path.display().to_string())
            }
            Delivery::Uploaded { location } => Some(location.clone()),
            Delivery::Discarded => None,
        }
    }

    /// Non-fatal problem worth reporting alongside a successful entity
    pub fn warning(&self) -> Option<String> {
        match self {
            Delivery::StagedLocally { path, upload_error } => Some(format!(
                "upload failed, output kept at {}: {}",
                path.display(),
                upload_error
            )),
            _ => None,
        }
    }
}

/// Destination for one entity's CSV output
///
/// Implementors supply their [`CsvOutput`] and the finalize step; writing,
/// flushing and discarding are shared.
#[async_trait]
pub trait Sink: Send {
    /// Output file being written
    fn output(&self) -> &CsvOutput;

    /// Output file being written, mutably
    fn output_mut(&mut self) -> &mut CsvOutput;

    /// Finalizes the output and delivers it
    async fn close(self: Box<Self>) -> Result<Delivery>;

    /// Writes the header line from the cursor's column names
    fn write_headers(&mut self, columns: &[String]) -> Result<()> {
        self.output_mut().write_headers(columns)
    }

    /// Buffer the cursor scans the next row into; `None` once discarded
    fn row_buffer(&mut self) -> Option<&mut RowBuffer> {
        self.output_mut().row_buffer()
    }

    /// Serializes the buffered row
    fn write_buffered_row(&mut self) -> Result<()> {
        self.output_mut().write_buffered_row()
    }

    /// Pushes buffered output to the local file
    async fn flush(&mut self) -> Result<()> {
        self.output_mut().flush()
    }

    /// Deletes the output if no data rows were written
    ///
    /// # Returns
    ///
    /// `true` if the output was removed.
    async fn remove(&mut self) -> Result<bool> {
        self.output_mut().remove()
    }

    /// Discards the output regardless of row count
    async fn abort(&mut self) -> Result<()> {
        self.output_mut().abort()
    }

    /// Data rows written so far (header excluded)
    fn rows_written(&self) -> u64 {
        self.output().rows_written()
    }

    /// Local file backing this sink
    fn local_path(&self) -> &Path {
        self.output().path()
    }
}

/// Factory for per-entity sinks
#[derive(Clone)]
pub enum Destination {
    /// Files stay in the export directory
    Local { export_dir: PathBuf },

    /// Files are staged in the export directory and uploaded
    Remote {
        export_dir: PathBuf,
        prefix: String,
        store: Arc<dyn BlobStore>,
    },
}

impl Destination {
    /// Local destination
    pub fn local(export_dir: impl Into<PathBuf>) -> Self {
        Destination::Local {
            export_dir: export_dir.into(),
        }
    }

    /// Remote destination; `prefix` must already be normalized
    pub fn remote(
        export_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Destination::Remote {
            export_dir: export_dir.into(),
            prefix: prefix.into(),
            store,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Local { .. } => "local",
            Destination::Remote { .. } => "remote",
        }
    }

    /// Opens the sink for an entity's window
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Sink` if the local (or staging) file cannot be created.
    pub fn open(&self, entity: &str, start: SyncTimestamp) -> Result<Box<dyn Sink>> {
        match self {
            Destination::Local { export_dir } => {
                let path = naming::local_path(export_dir, entity, start);
                Ok(Box::new(LocalSink::create(path)?))
            }
            Destination::Remote {
                export_dir,
                prefix,
                store,
            } => {
                let staging = naming::local_path(export_dir, entity, start);
                let key = naming::remote_key(prefix, entity, start);
                Ok(Box::new(RemoteSink::create(staging, key, Arc::clone(store))?))
            }
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Local { export_dir } => f
                .debug_struct("Local")
                .field("export_dir", export_dir)
                .finish(),
            Destination::Remote {
                export_dir, prefix, ..
            } => f
                .debug_struct("Remote")
                .field("export_dir", export_dir)
                .field("prefix", prefix)
                .finish_non_exhaustive(),
        }
    }
}

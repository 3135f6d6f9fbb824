//! Local-file sink

use super::serializer::CsvOutput;
use super::{Delivery, Sink};
use crate::domain::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Writes CSV straight to its final path in the export directory
pub struct LocalSink {
    output: CsvOutput,
}

impl LocalSink {
    /// Creates the destination file immediately
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Sink` if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            output: CsvOutput::create(path)?,
        })
    }
}

#[async_trait]
impl Sink for LocalSink {
    fn output(&self) -> &CsvOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut CsvOutput {
        &mut self.output
    }

    async fn close(self: Box<Self>) -> Result<Delivery> {
        Ok(match self.output.finish()? {
            Some(path) => Delivery::Local { path },
            None => Delivery::Discarded,
        })
    }
}

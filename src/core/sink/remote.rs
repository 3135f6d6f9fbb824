//! Remote-object sink
//!
//! Stages the CSV in the export directory, uploads it on close, then deletes
//! the staging copy. A failed upload keeps the staging file as the
//! recoverable output.

use super::serializer::CsvOutput;
use super::{Delivery, Sink};
use crate::adapters::blob::BlobStore;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single output upload
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Sink that delivers to a [`BlobStore`] on close
pub struct RemoteSink {
    output: CsvOutput,
    key: String,
    store: Arc<dyn BlobStore>,
    upload_timeout: Duration,
}

impl RemoteSink {
    /// Creates the staging file immediately
    ///
    /// # Arguments
    ///
    /// * `staging` - Local path the CSV is written to before upload
    /// * `key` - Destination object key
    /// * `store` - Remote storage client
    pub fn create(
        staging: impl Into<PathBuf>,
        key: impl Into<String>,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        Ok(Self {
            output: CsvOutput::create(staging)?,
            key: key.into(),
            store,
            upload_timeout: UPLOAD_TIMEOUT,
        })
    }

    /// Overrides the upload timeout
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }
}

#[async_trait]
impl Sink for RemoteSink {
    fn output(&self) -> &CsvOutput {
        &self.output
    }

    fn output_mut(&mut self) -> &mut CsvOutput {
        &mut self.output
    }

    async fn close(self: Box<Self>) -> Result<Delivery> {
        let this = *self;
        let Some(staging) = this.output.finish()? else {
            return Ok(Delivery::Discarded);
        };

        let uploaded = tokio::time::timeout(
            this.upload_timeout,
            this.store.upload_file(&this.key, &staging),
        )
        .await;

        let upload_error = match uploaded {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "upload timed out after {}s",
                this.upload_timeout.as_secs()
            )),
        };

        if let Some(upload_error) = upload_error {
            tracing::warn!(
                key = %this.key,
                staging = %staging.display(),
                error = %upload_error,
                "Upload failed; local file kept"
            );
            return Ok(Delivery::StagedLocally {
                path: staging,
                upload_error,
            });
        }

        if let Err(e) = tokio::fs::remove_file(&staging).await {
            tracing::warn!(
                staging = %staging.display(),
                error = %e,
                "Uploaded but could not remove staging file"
            );
        }

        Ok(Delivery::Uploaded {
            location: this.store.location(&this.key),
        })
    }
}

//! S3 blob store
//!
//! Works against AWS S3 and S3-compatible endpoints. Credentials come from
//! the config when both keys are set, otherwise from the default AWS chain.

use super::traits::BlobStore;
use crate::config::RemoteConfig;
use crate::domain::{Result, SyncError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use secrecy::ExposeSecret;
use std::path::Path;

const CONNECTIVITY_PROBE: &str = ".tidemark-connectivity-test";

/// [`BlobStore`] backed by `aws-sdk-s3`
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3BlobStore {
    /// Builds a client from the remote configuration
    ///
    /// # Arguments
    ///
    /// * `cfg` - Remote storage configuration
    #[tracing::instrument(level = "debug", skip(cfg), fields(bucket = %cfg.bucket))]
    pub async fn new(cfg: &RemoteConfig) -> Result<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key_id, &cfg.secret_access_key) {
            let creds = Credentials::new(
                access_key.clone(),
                secret_key.expose_secret().as_str().to_string(),
                cfg.session_token
                    .as_ref()
                    .map(|t| t.expose_secret().as_str().to_string()),
                None,
                "tidemark_static",
            );
            loader = loader.credentials_provider(creds);
        }

        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_cfg = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(cfg.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_cfg),
            bucket: cfg.bucket.clone(),
            prefix: cfg.normalized_prefix(),
        })
    }

    fn backend_error<E>(&self, op: &str, key: &str, err: E) -> SyncError
    where
        E: std::error::Error,
    {
        SyncError::Blob(format!(
            "{op} s3://{}/{}: {}",
            self.bucket,
            key,
            DisplayErrorContext(err)
        ))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(level = "debug", skip(self, path))]
    async fn upload_file(&self, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            SyncError::Blob(format!("cannot read {} for upload: {}", path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| self.backend_error("put_object", key, e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, data))]
    async fn upload_bytes(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| self.backend_error("put_object", key, e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn download_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                // Some S3-compatible stores report a bare 404
                let msg = DisplayErrorContext(&e).to_string();
                if msg.contains("NoSuchKey") || msg.contains("NotFound") {
                    return Ok(None);
                }
                return Err(self.backend_error("get_object", key, e));
            }
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| self.backend_error("collect body", key, e))?
            .into_bytes();
        Ok(Some(data.to_vec()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.backend_error("delete_object", key, e))?;
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        let key = format!("{}{}", self.prefix, CONNECTIVITY_PROBE);

        self.upload_bytes(&key, b"ok".to_vec())
            .await
            .map_err(|e| SyncError::Connection(format!("S3 write check failed: {e}")))?;
        self.delete(&key)
            .await
            .map_err(|e| SyncError::Connection(format!("S3 delete check failed: {e}")))?;

        tracing::info!(bucket = %self.bucket, prefix = %self.prefix, "S3 connection test successful");
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

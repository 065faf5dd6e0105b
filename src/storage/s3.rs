//! S3 object storage client for image assets
//!
//! Objects live under `images/` keys inside a single bucket. The client
//! speaks the AWS SDK and accepts a custom endpoint for S3-compatible
//! backends (MinIO, R2).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    Client as S3Client,
    config::{BehaviorVersion, Builder, Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::StorageSettings;

/// Errors that can occur during object storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage not configured")]
    NotConfigured,

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),
}

/// Object-store operations the asset coordinator depends on
///
/// `S3Store` is the production implementation; tests substitute an
/// in-memory store to exercise partial-failure paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object under the given key
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Delete the object under the given key
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Generate a time-limited signed URL for a client-side PUT
    async fn presign_put(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;

    /// Durable public URL for a stored object
    fn public_url(&self, key: &str) -> String;
}

/// S3 client for image object storage
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
    region: String,
    public_url_prefix: Option<String>,
}

impl S3Store {
    /// Create a new store from settings
    ///
    /// Static credentials when configured, otherwise the SDK default
    /// chain (environment, profile, instance metadata).
    pub async fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        if settings.bucket.is_empty() {
            return Err(StorageError::NotConfigured);
        }

        let mut builder = if settings.access_key_id.is_empty() {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(settings.region.clone()))
                .load()
                .await;
            Builder::from(&shared)
        } else {
            let credentials = Credentials::new(
                &settings.access_key_id,
                &settings.secret_access_key,
                None, // session token
                None, // expiry
                "imgvault-static-credentials",
            );

            Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new(settings.region.clone()))
                .credentials_provider(credentials)
        };

        // Custom endpoints (MinIO, R2) need path-style addressing
        if let Some(ref endpoint) = settings.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            public_url_prefix: settings.public_url_prefix.clone(),
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = data.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .content_length(size)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{:?}", e)))?;

        info!("Uploaded to S3: {} ({} bytes)", key, size);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("{:?}", e)))?;

        info!("Deleted from S3: {}", key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn presign_put(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| StorageError::PresignFailed(format!("{:?}", e)))?;

        debug!("Presigned PUT for {} (expires in {:?})", key, expires_in);
        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        match self.public_url_prefix {
            Some(ref prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            // Virtual-hosted S3 URL; persisted in metadata rows, so the
            // format is a compatibility contract
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(prefix: Option<&str>) -> StorageSettings {
        StorageSettings {
            bucket: "my-images".to_string(),
            region: "eu-west-1".to_string(),
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            endpoint: None,
            public_url_prefix: prefix.map(String::from),
            presign_expiry_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_public_url_default_format() {
        let store = S3Store::new(&settings(None)).await.unwrap();
        assert_eq!(
            store.public_url("images/1700000000000-cat.png"),
            "https://my-images.s3.eu-west-1.amazonaws.com/images/1700000000000-cat.png"
        );
    }

    #[tokio::test]
    async fn test_public_url_prefix_override() {
        let store = S3Store::new(&settings(Some("https://cdn.example.com/"))).await.unwrap();
        assert_eq!(
            store.public_url("images/1700000000000-cat.png"),
            "https://cdn.example.com/images/1700000000000-cat.png"
        );
    }

    #[tokio::test]
    async fn test_empty_bucket_is_not_configured() {
        let mut s = settings(None);
        s.bucket = String::new();
        assert!(matches!(
            S3Store::new(&s).await,
            Err(StorageError::NotConfigured)
        ));
    }
}

//! Object storage backend selection (memory/local filesystem/S3).

use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use super::manager::TransferError;

/// Configuration for the remote blob storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

impl TransferConfig {
    /// Build the backing object store for this configuration.
    pub(crate) async fn build(&self) -> Result<Arc<dyn ObjectStore>, TransferError> {
        let store: Arc<dyn ObjectStore> = match self {
            TransferConfig::Memory => Arc::new(InMemory::new()),

            TransferConfig::Local { path } => {
                // Ensure the directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| TransferError::InvalidConfig(e.to_string()))?,
                )
            }

            TransferConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                Arc::new(
                    builder
                        .build()
                        .map_err(|e| TransferError::InvalidConfig(e.to_string()))?,
                )
            }
        };

        Ok(store)
    }
}

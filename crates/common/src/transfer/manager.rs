use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::storage::TransferConfig;

/// Errors that can occur in the blob transfer layer
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("transfer error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transfer task failed: {0}")]
    TaskFailed(String),
    #[error("unknown operation id: {0}")]
    UnknownOp(OpId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Identifier of an in-flight upload or download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

type PendingOps = Mutex<HashMap<OpId, JoinHandle<Result<(), TransferError>>>>;

/// Client for moving named opaque blobs to and from remote storage.
///
/// `upload` and `download` run as spawned tasks identified by an [`OpId`];
/// callers use [`wait_for`](TransferManager::wait_for) to block until an
/// operation finishes. The manager is cheap to clone and every clone shares
/// the pending-operation table and the temp-file area.
#[derive(Clone)]
pub struct TransferManager {
    store: Arc<dyn ObjectStore>,
    pending: Arc<PendingOps>,
    next_op: Arc<AtomicU64>,
    temp_dir: Arc<tempfile::TempDir>,
}

impl TransferManager {
    /// Build a transfer manager for the configured backend.
    pub async fn new(config: TransferConfig) -> Result<Self, TransferError> {
        let store = config.build().await?;
        Ok(Self {
            store,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_op: Arc::new(AtomicU64::new(0)),
            temp_dir: Arc::new(tempfile::TempDir::new()?),
        })
    }

    /// Build a transfer manager over in-memory storage (for testing).
    pub async fn memory() -> Result<Self, TransferError> {
        Self::new(TransferConfig::Memory).await
    }

    fn register(&self, handle: JoinHandle<Result<(), TransferError>>) -> OpId {
        let id = OpId(self.next_op.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().insert(id, handle);
        id
    }

    /// Start uploading a local file to the named blob.
    pub fn upload(&self, name: &str, source: &Path) -> OpId {
        let store = self.store.clone();
        let name = name.to_string();
        let source = source.to_path_buf();
        self.register(tokio::spawn(async move {
            let data = bytes::Bytes::from(tokio::fs::read(&source).await?);
            let location = ObjectPath::from(name.as_str());
            store.put(&location, data.into()).await?;
            tracing::debug!(%name, "uploaded blob");
            Ok(())
        }))
    }

    /// Start downloading the named blob into a local file.
    ///
    /// A missing blob completes the operation with
    /// [`TransferError::NotFound`], surfaced by `wait_for`.
    pub fn download(&self, name: &str, dest: &Path) -> OpId {
        let store = self.store.clone();
        let name = name.to_string();
        let dest = dest.to_path_buf();
        self.register(tokio::spawn(async move {
            let location = ObjectPath::from(name.as_str());
            let result = match store.get(&location).await {
                Ok(result) => result,
                Err(object_store::Error::NotFound { .. }) => {
                    return Err(TransferError::NotFound(name));
                }
                Err(e) => return Err(e.into()),
            };
            let bytes = result.bytes().await?;
            tokio::fs::write(&dest, &bytes).await?;
            tracing::debug!(%name, len = bytes.len(), "downloaded blob");
            Ok(())
        }))
    }

    /// Wait for a previously started operation to complete.
    pub async fn wait_for(&self, op: OpId) -> Result<(), TransferError> {
        let handle = self
            .pending
            .lock()
            .remove(&op)
            .ok_or(TransferError::UnknownOp(op))?;
        handle
            .await
            .map_err(|e| TransferError::TaskFailed(e.to_string()))?
    }

    /// Delete the named blob. Already-missing blobs are not an error.
    pub async fn delete(&self, name: &str) -> Result<(), TransferError> {
        let location = ObjectPath::from(name);
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether the named blob exists.
    pub async fn exists(&self, name: &str) -> Result<bool, TransferError> {
        let location = ObjectPath::from(name);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Allocate a fresh file in the manager's scratch directory.
    ///
    /// The file lives until the last clone of the manager is dropped.
    pub fn create_temp_file(&self) -> Result<PathBuf, TransferError> {
        let path = self.temp_dir.path().join(Uuid::new_v4().to_string());
        std::fs::File::create(&path)?;
        Ok(path)
    }
}

//! Navigation sessions and the commit protocol
//!
//! This module is the stateful core of the system:
//!
//! - **[`Vault`]**: owns the key pair and mints root sessions, the entry
//!   point for everything else
//! - **[`Navigation`]**: one session per folder position; owns that folder's
//!   [`DirectoryIndex`](crate::index::DirectoryIndex), stages mutations, and
//!   drives the crypto and transfer layers
//!
//! # Concurrency model
//!
//! A session is used by a single logical caller; there is no internal
//! locking. Concurrent writers (other sessions, other devices) are never
//! blocked against each other. Instead every commit captures the index
//! version it started from, re-fetches the published index, and if another
//! writer got there first, merges its own staged mutations into the winner's
//! snapshot before publishing (see [`Navigation::commit`]). Losing entries
//! are preserved under a deterministic `<name>_conflict_<mtime>` rename,
//! never silently dropped.
//!
//! # Deferred deletion
//!
//! Remote blobs are never deleted inline. Deletions queue up in the session
//! and flush only after the owning index commit has fully persisted, so a
//! failed commit cannot orphan live data and a crash mid-operation cannot
//! leave a reachable entry pointing at a deleted blob.

mod session;
mod vault;

use crate::crypto::{SealedError, SecretError};
use crate::index::IndexError;
use crate::transfer::TransferError;

pub use session::{Navigation, PATH_SEP};
pub use vault::Vault;

/// Errors surfaced by navigation sessions.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage error: {0}")]
    Default(#[from] anyhow::Error),
    /// A blob was absent, or present but failed authenticated decryption.
    /// The two are deliberately indistinguishable at this boundary.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
    /// The conflict-rename loop hit its iteration guard without finding a
    /// free name.
    #[error("conflict merge did not converge for entry {0}")]
    MergeDiverged(String),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("crypto error: {0}")]
    Crypto(#[from] SecretError),
    #[error("sealed index error: {0}")]
    Sealed(#[from] SealedError),
    #[error("transfer error: {0}")]
    Transfer(TransferError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransferError> for StorageError {
    /// Missing blobs keep their identity across the transfer boundary so
    /// callers can branch on [`StorageError::NotFound`]; everything else
    /// wraps as a transfer failure.
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::NotFound(name) => StorageError::NotFound(name),
            other => StorageError::Transfer(other),
        }
    }
}

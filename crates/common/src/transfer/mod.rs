//! Blob transfer layer
//!
//! The remote side of a vault is nothing but a store of named opaque blobs;
//! everything in it is ciphertext produced by the crypto layer. This module
//! wraps an [`object_store`] backend (in-memory, local filesystem, or S3)
//! behind the transfer contract the navigation layer depends on:
//!
//! - `upload`/`download` start an asynchronous operation and hand back an
//!   [`OpId`]; [`wait_for`](TransferManager::wait_for) blocks the caller
//!   until that operation completes. Sessions always wait, so callers never
//!   observe a partial transfer.
//! - A download of a missing blob is a typed [`TransferError::NotFound`],
//!   distinct from transport failures, and navigation branches on it.
//! - `delete` ignores already-missing blobs.
//! - The manager owns a scratch directory for the temp files transfers are
//!   staged through.

mod manager;
mod storage;

pub use manager::{OpId, TransferError, TransferManager};
pub use storage::TransferConfig;

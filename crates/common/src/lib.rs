/**
 * Cryptographic types and operations.
 *  - Owner key pair (Ed25519, converted to X25519 for ECDH)
 *  - Per-blob symmetric content encryption
 *  - Sealed boxes for the root directory index
 */
pub mod crypto;
/**
 * Directory indices: the versioned record of one
 *  folder's children (files, subfolders, external
 *  references), persisted as encrypted snapshots.
 */
pub mod index;
/**
 * Navigation sessions over the encrypted tree and
 *  the optimistic commit / conflict-merge protocol.
 */
pub mod nav;
/**
 * Blob transfer layer.
 *  A light wrapper around object_store backends
 *  (memory, local filesystem, S3) with operation
 *  ids and blocking waits.
 */
pub mod transfer;

pub mod prelude {
    pub use crate::crypto::{KeyPair, PublicKey, Secret};
    pub use crate::index::{DirectoryIndex, FileEntry, FolderEntry};
    pub use crate::nav::{Navigation, StorageError, Vault};
    pub use crate::transfer::{TransferConfig, TransferManager};
}

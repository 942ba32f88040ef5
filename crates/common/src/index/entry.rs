use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, Secret};

/// One file inside a folder.
///
/// The entry is immutable once uploaded except for renaming; overwriting a
/// name replaces the whole entry with a fresh block and a fresh key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Name, unique within the parent folder across all entry kinds.
    pub name: String,
    /// Opaque block identifier; the encrypted content lives at
    /// `blocks/<block>` in remote storage. No two live entries share one.
    pub block: String,
    /// Per-file symmetric key, generated at upload time and never reused.
    pub key: Secret,
    /// Upload completion time, seconds since the epoch.
    pub mtime: u64,
    /// Size of the encrypted block in bytes.
    pub size: u64,
}

/// One subfolder inside a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Name, unique within the parent folder across all entry kinds.
    pub name: String,
    /// Blob name of the child's own directory index.
    pub reference: String,
    /// Per-folder symmetric key, generated at folder creation and never
    /// rotated. Decrypts the child index blob.
    pub key: Secret,
}

/// A federated reference to a folder owned by another key pair.
///
/// Index-level CRUD is supported so shares can be recorded, but navigating,
/// listing, or renaming externals is not implemented anywhere above this
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntry {
    /// Name, unique within the parent folder across all entry kinds.
    pub name: String,
    /// Public key of the owning key pair.
    pub owner: PublicKey,
    /// Blob name of the external index.
    pub reference: String,
    /// Key the owner granted for the external index.
    pub key: Secret,
}

impl FileEntry {
    /// Remote blob name of this entry's encrypted block.
    pub fn block_ref(&self) -> String {
        format!("blocks/{}", self.block)
    }
}

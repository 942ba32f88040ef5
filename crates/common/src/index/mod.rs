//! Directory index data structures
//!
//! This module defines the authoritative record of one folder's children:
//!
//! - **[`FileEntry`]**: a file's block reference, per-file key, mtime and size
//! - **[`FolderEntry`]**: a subfolder's index reference and per-folder key
//! - **[`ExternalEntry`]**: a federated reference owned by another key pair
//! - **[`DirectoryIndex`]**: the embedded, versioned store holding the entries
//!
//! # Architecture
//!
//! ## The tree as linked indices
//!
//! Every folder owns exactly one `DirectoryIndex`, stored remotely as an
//! encrypted blob under the index's `reference`. Folder entries point at
//! their child's index blob and carry the key that decrypts it:
//!
//! ```text
//! Root Index (sealed to the owner key pair)
//!     |
//!     +-- FileEntry  "notes.txt" --> blocks/<uuid>   (per-file key)
//!     +-- FolderEntry "docs"     --> <child index>   (per-folder key)
//!                                        |
//!                                        +-- FileEntry "a.pdf" --> blocks/<uuid>
//! ```
//!
//! ## Versioning
//!
//! An index's [`Fingerprint`] is the blake3 hash of its persisted snapshot,
//! so it changes exactly when the on-disk content changes. The commit
//! protocol compares fingerprints to detect concurrent writers.

mod directory;
mod entry;

pub use directory::{DirectoryIndex, Fingerprint, IndexError};
pub use entry::{ExternalEntry, FileEntry, FolderEntry};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::{ExternalEntry, FileEntry, FolderEntry};

/// Errors that can occur while operating on a directory index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("name conflict: {0}")]
    NameConflict(String),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque version fingerprint of a directory index.
///
/// The fingerprint is the blake3 hash of the persisted snapshot, so it
/// changes if and only if the on-disk content changes. The commit protocol
/// compares fingerprints to detect writes that landed remotely after a
/// session's baseline was taken.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn of(bytes: &[u8]) -> Self {
        Fingerprint(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..8])
    }
}

/// The serialized portion of an index: the entry tables, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    files: BTreeMap<String, FileEntry>,
    folders: BTreeMap<String, FolderEntry>,
    externals: BTreeMap<String, ExternalEntry>,
}

/// The authoritative record of one folder's children.
///
/// A `DirectoryIndex` is an embedded record store: entries are mutated in
/// memory and [`commit`](DirectoryIndex::commit) persists a bincode snapshot
/// to a local scratch file and recomputes the version fingerprint. The
/// snapshot file is what gets encrypted and uploaded by the navigation
/// layer; a downloaded snapshot is opened with
/// [`open`](DirectoryIndex::open).
///
/// Exactly one navigation session owns an index at a time; there is no
/// internal locking.
#[derive(Debug)]
pub struct DirectoryIndex {
    /// Blob name this index is published under remotely.
    reference: String,
    /// Identity of the device that opened or created this index.
    device_id: Uuid,
    /// Local scratch file holding the last committed snapshot.
    path: PathBuf,
    /// Scratch directory for this index and its descendants.
    temp_dir: PathBuf,
    version: Fingerprint,
    snapshot: Snapshot,
}

impl DirectoryIndex {
    /// Create a fresh, empty index under a random reference.
    ///
    /// The initial snapshot is persisted immediately so the index always has
    /// readable on-disk content.
    pub fn create(device_id: Uuid, temp_dir: &Path) -> Result<Self, IndexError> {
        Self::create_with_reference(Uuid::new_v4().to_string(), device_id, temp_dir)
    }

    /// Create a fresh, empty index under a caller-chosen reference.
    ///
    /// Used for the root index, whose reference is derived from the owner's
    /// key pair rather than generated.
    pub fn create_with_reference(
        reference: String,
        device_id: Uuid,
        temp_dir: &Path,
    ) -> Result<Self, IndexError> {
        let mut index = DirectoryIndex {
            path: Self::scratch_path(temp_dir),
            reference,
            device_id,
            temp_dir: temp_dir.to_path_buf(),
            version: Fingerprint::of(&[]),
            snapshot: Snapshot::default(),
        };
        index.commit()?;
        Ok(index)
    }

    /// Open an index from a decrypted snapshot, as downloaded from remote
    /// storage.
    ///
    /// The snapshot bytes are persisted to a fresh scratch file and the
    /// version fingerprint is taken over them, so two opens of the same
    /// published blob always agree on the version.
    pub fn open(
        snapshot: &[u8],
        device_id: Uuid,
        reference: &str,
        temp_dir: &Path,
    ) -> Result<Self, IndexError> {
        let decoded: Snapshot = bincode::deserialize(snapshot)?;
        let path = Self::scratch_path(temp_dir);
        std::fs::write(&path, snapshot)?;
        tracing::debug!(reference, path = %path.display(), "opened directory index");
        Ok(DirectoryIndex {
            path,
            reference: reference.to_string(),
            device_id,
            temp_dir: temp_dir.to_path_buf(),
            version: Fingerprint::of(snapshot),
            snapshot: decoded,
        })
    }

    fn scratch_path(temp_dir: &Path) -> PathBuf {
        temp_dir.join(format!("index-{}.bin", Uuid::new_v4()))
    }

    /// Blob name this index is published under.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Identity of the device operating on this index.
    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    /// Current version fingerprint, as of the last commit or open.
    ///
    /// In-memory mutations are not reflected until [`commit`] runs.
    ///
    /// [`commit`]: DirectoryIndex::commit
    pub fn version(&self) -> Fingerprint {
        self.version
    }

    /// Scratch directory used for this index and any child indices.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Local file holding the last committed snapshot.
    pub fn snapshot_path(&self) -> &Path {
        &self.path
    }

    /// Persist the current entries to the local snapshot file and recompute
    /// the version fingerprint.
    ///
    /// This is a local commit only; publishing the snapshot remotely is the
    /// navigation layer's job.
    pub fn commit(&mut self) -> Result<(), IndexError> {
        let bytes = bincode::serialize(&self.snapshot)?;
        std::fs::write(&self.path, &bytes)?;
        self.version = Fingerprint::of(&bytes);
        Ok(())
    }

    fn name_taken_by_other_kind(&self, name: &str, kind: EntryKind) -> bool {
        (kind != EntryKind::File && self.snapshot.files.contains_key(name))
            || (kind != EntryKind::Folder && self.snapshot.folders.contains_key(name))
            || (kind != EntryKind::External && self.snapshot.externals.contains_key(name))
    }

    /* Files */

    pub fn get_file(&self, name: &str) -> Option<&FileEntry> {
        self.snapshot.files.get(name)
    }

    /// Insert a file entry.
    ///
    /// Fails with [`IndexError::NameConflict`] if a folder or external
    /// already occupies the name. Inserting over an existing *file* replaces
    /// it, matching overwrite-by-upload semantics.
    pub fn insert_file(&mut self, entry: FileEntry) -> Result<(), IndexError> {
        if self.name_taken_by_other_kind(&entry.name, EntryKind::File) {
            return Err(IndexError::NameConflict(entry.name));
        }
        self.snapshot.files.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Remove a file entry, matching the *whole* entry rather than just the
    /// name. Returns whether anything was removed.
    ///
    /// Exact matching means a caller holding a stale entry cannot clobber a
    /// replacement that another writer published under the same name.
    pub fn remove_file(&mut self, entry: &FileEntry) -> bool {
        match self.snapshot.files.get(&entry.name) {
            Some(existing) if existing == entry => {
                self.snapshot.files.remove(&entry.name);
                true
            }
            _ => false,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.snapshot.files.values()
    }

    /* Folders */

    pub fn get_folder(&self, name: &str) -> Option<&FolderEntry> {
        self.snapshot.folders.get(name)
    }

    /// Insert a folder entry.
    ///
    /// Fails with [`IndexError::NameConflict`] if any entry of a different
    /// kind occupies the name.
    pub fn insert_folder(&mut self, entry: FolderEntry) -> Result<(), IndexError> {
        if self.name_taken_by_other_kind(&entry.name, EntryKind::Folder) {
            return Err(IndexError::NameConflict(entry.name));
        }
        self.snapshot.folders.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Remove a folder entry by exact match. Returns whether anything was
    /// removed.
    pub fn remove_folder(&mut self, entry: &FolderEntry) -> bool {
        match self.snapshot.folders.get(&entry.name) {
            Some(existing) if existing == entry => {
                self.snapshot.folders.remove(&entry.name);
                true
            }
            _ => false,
        }
    }

    pub fn folders(&self) -> impl Iterator<Item = &FolderEntry> {
        self.snapshot.folders.values()
    }

    /* Externals */

    pub fn get_external(&self, name: &str) -> Option<&ExternalEntry> {
        self.snapshot.externals.get(name)
    }

    /// Insert an external-reference entry.
    ///
    /// Fails with [`IndexError::NameConflict`] if any entry of a different
    /// kind occupies the name.
    pub fn insert_external(&mut self, entry: ExternalEntry) -> Result<(), IndexError> {
        if self.name_taken_by_other_kind(&entry.name, EntryKind::External) {
            return Err(IndexError::NameConflict(entry.name));
        }
        self.snapshot.externals.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Remove an external entry by exact match. Returns whether anything was
    /// removed.
    pub fn remove_external(&mut self, entry: &ExternalEntry) -> bool {
        match self.snapshot.externals.get(&entry.name) {
            Some(existing) if existing == entry => {
                self.snapshot.externals.remove(&entry.name);
                true
            }
            _ => false,
        }
    }

    pub fn externals(&self) -> impl Iterator<Item = &ExternalEntry> {
        self.snapshot.externals.values()
    }
}

#[derive(PartialEq, Clone, Copy)]
enum EntryKind {
    File,
    Folder,
    External,
}

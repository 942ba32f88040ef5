use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use crate::crypto::{open_sealed, seal, KeyPair, Secret, SecretError};
use crate::index::{DirectoryIndex, FileEntry, FolderEntry, IndexError};
use crate::transfer::TransferManager;

use super::StorageError;

/// Separator used when building session paths.
pub const PATH_SEP: &str = "/";

/// Iteration guard for the conflict-rename loop. The suffix is time-derived
/// so the same collision cannot recur after a rename, but pathological
/// clocks must not turn the merge into an unbounded loop.
const MAX_MERGE_ATTEMPTS: usize = 8;

/// How a session's index blob is keyed remotely.
#[derive(Clone)]
pub(super) enum IndexKeys {
    /// The root index, sealed asymmetrically to the owner key pair.
    Root,
    /// A subfolder index, encrypted under the folder key held by its parent.
    Folder(Secret),
}

/// A staged mutation: the pre-edit baseline entry (if any) plus the entry as
/// uploaded. Consumed by the conflict merge at commit time, discarded after.
#[derive(Debug, Clone)]
struct FileUpdate {
    old: Option<FileEntry>,
    updated: FileEntry,
}

/// A session positioned at one folder of the encrypted tree.
///
/// The session exclusively owns its folder's [`DirectoryIndex`]. Mutations
/// (`upload`, `delete_*`, `rename_*`, `create_folder`) take effect in the
/// local index immediately and mark the session dirty; nothing reaches
/// remote storage until [`commit`](Navigation::commit) publishes the index
/// and flushes deferred deletions. Descending with
/// [`navigate`](Navigation::navigate) produces a *new* session value; the
/// current one is left untouched.
pub struct Navigation {
    index: DirectoryIndex,
    keys: IndexKeys,
    key_pair: KeyPair,
    transfer: TransferManager,
    path: String,
    staged: Vec<FileUpdate>,
    delete_queue: HashSet<String>,
    dirty: bool,
}

impl Navigation {
    pub(super) fn new(
        index: DirectoryIndex,
        keys: IndexKeys,
        key_pair: KeyPair,
        transfer: TransferManager,
        path: String,
    ) -> Self {
        Navigation {
            index,
            keys,
            key_pair,
            transfer,
            path,
            staged: Vec::new(),
            delete_queue: HashSet::new(),
            dirty: false,
        }
    }

    /// Absolute path of the folder this session is positioned at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the session holds uncommitted mutations.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Blob names queued for deletion at the next successful commit.
    pub fn deferred_deletes(&self) -> &HashSet<String> {
        &self.delete_queue
    }

    /// Files in the current folder.
    pub fn list_files(&self) -> Vec<FileEntry> {
        self.index.files().cloned().collect()
    }

    /// Subfolders of the current folder.
    pub fn list_folders(&self) -> Vec<FolderEntry> {
        self.index.folders().cloned().collect()
    }

    /// Listing external references is not implemented.
    pub fn list_externals(&self) -> Result<Vec<crate::index::ExternalEntry>, StorageError> {
        Err(StorageError::Unimplemented("externals listing"))
    }

    /// Descend into a direct subfolder, returning a new session positioned
    /// there.
    ///
    /// Fails with [`StorageError::NotFound`] if `folder` is not a direct
    /// child of the current index, if the child's index blob is missing, or
    /// if the blob fails authenticated decryption under the folder key.
    pub async fn navigate(&self, folder: &FolderEntry) -> Result<Navigation, StorageError> {
        let is_child = self
            .index
            .folders()
            .any(|f| f.reference == folder.reference);
        if !is_child {
            return Err(StorageError::NotFound(format!(
                "{} is not a direct subfolder of {}",
                folder.name, self.path
            )));
        }

        tracing::debug!(path = %self.path, folder = %folder.name, "navigating");
        let blob = self.blocking_download(&folder.reference).await?;
        let encrypted = std::fs::read(&blob)?;
        let snapshot = match folder.key.decrypt(&encrypted) {
            Ok(bytes) => bytes,
            Err(SecretError::Authentication) => {
                return Err(StorageError::NotFound("invalid key".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let index = DirectoryIndex::open(
            &snapshot,
            self.index.device_id(),
            &folder.reference,
            self.index.temp_dir(),
        )?;
        Ok(Navigation::new(
            index,
            IndexKeys::Folder(folder.key.clone()),
            self.key_pair.clone(),
            self.transfer.clone(),
            format!("{}{}{}", self.path, folder.name, PATH_SEP),
        ))
    }

    /// Navigating into external references is not implemented.
    pub fn navigate_external(
        &self,
        _external: &crate::index::ExternalEntry,
    ) -> Result<Navigation, StorageError> {
        Err(StorageError::Unimplemented("externals navigation"))
    }

    /// Encrypt and upload a file under a fresh key and a fresh block
    /// identifier.
    ///
    /// If an entry with `name` already exists its old block is queued for
    /// deferred deletion and the entry is replaced: last writer wins
    /// locally; divergence against other writers is reconciled at commit.
    pub async fn upload<R: Read>(
        &mut self,
        name: &str,
        content: R,
    ) -> Result<FileEntry, StorageError> {
        let key = Secret::generate();
        let block = Uuid::new_v4().to_string();
        let (mtime, size) = self
            .upload_encrypted(content, &key, &format!("blocks/{block}"))
            .await?;
        let entry = FileEntry {
            name: name.to_string(),
            block,
            key,
            mtime,
            size,
        };

        // Overwrite = delete old file, upload new file
        let old = self.index.get_file(name).cloned();
        if let Some(old_entry) = &old {
            self.delete_queue.insert(old_entry.block_ref());
            self.index.remove_file(old_entry);
        }
        self.staged.push(FileUpdate {
            old,
            updated: entry.clone(),
        });
        self.dirty = true;
        self.index.insert_file(entry.clone())?;
        Ok(entry)
    }

    /// Download and decrypt a file's block.
    ///
    /// An authentication failure here means corruption or tampering of
    /// stored content and is a hard error, never an empty result.
    pub async fn download(&self, file: &FileEntry) -> Result<Bytes, StorageError> {
        let blob = self.blocking_download(&file.block_ref()).await?;
        let encrypted = std::fs::read(&blob)?;
        let plaintext = file.key.decrypt(&encrypted)?;
        Ok(Bytes::from(plaintext))
    }

    /// Create an empty subfolder.
    ///
    /// The child index is committed (and therefore published) before this
    /// returns, so a reference to a never-persisted folder can never escape
    /// the session.
    pub async fn create_folder(&mut self, name: &str) -> Result<FolderEntry, StorageError> {
        let child = DirectoryIndex::create(self.index.device_id(), self.index.temp_dir())?;
        let key = Secret::generate();
        let folder = FolderEntry {
            name: name.to_string(),
            reference: child.reference().to_string(),
            key: key.clone(),
        };
        self.index.insert_folder(folder.clone())?;
        self.dirty = true;

        let mut child_nav = Navigation::new(
            child,
            IndexKeys::Folder(key),
            self.key_pair.clone(),
            self.transfer.clone(),
            format!("{}{}{}", self.path, name, PATH_SEP),
        );
        child_nav.commit().await?;
        Ok(folder)
    }

    /// Remove a file entry now; its block is deleted only after the next
    /// successful commit.
    pub fn delete_file(&mut self, file: &FileEntry) -> Result<(), StorageError> {
        self.index.remove_file(file);
        self.delete_queue.insert(file.block_ref());
        self.dirty = true;
        Ok(())
    }

    /// Recursively delete a subfolder.
    ///
    /// The subtree is torn down depth-first through its own session and that
    /// session is committed, flushing the subtree's deferred deletes,
    /// before the entry disappears from this index. A crash mid-way can
    /// orphan an unreachable subtree (reclaimable later) but never leaves a
    /// reachable entry dangling.
    pub fn delete_folder<'a>(
        &'a mut self,
        folder: &'a FolderEntry,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            let mut sub = self.navigate(folder).await?;
            for file in sub.list_files() {
                tracing::debug!(path = %sub.path, name = %file.name, "deleting file");
                sub.delete_file(&file)?;
            }
            for child in sub.list_folders() {
                tracing::debug!(path = %sub.path, name = %child.name, "deleting folder");
                sub.delete_folder(&child).await?;
            }
            sub.commit().await?;

            self.index.remove_folder(folder);
            self.delete_queue.insert(folder.reference.clone());
            self.dirty = true;
            Ok(())
        }
        .boxed()
    }

    /// Deleting external references is not implemented.
    pub fn delete_external(
        &mut self,
        _external: &crate::index::ExternalEntry,
    ) -> Result<(), StorageError> {
        Err(StorageError::Unimplemented("externals deletion"))
    }

    /// Rename a file within this folder. There is no cross-folder move.
    pub fn rename_file(
        &mut self,
        file: &FileEntry,
        new_name: &str,
    ) -> Result<FileEntry, StorageError> {
        self.index.remove_file(file);
        let mut renamed = file.clone();
        renamed.name = new_name.to_string();
        if let Err(e) = self.index.insert_file(renamed.clone()) {
            // put the original back so a name clash doesn't drop the entry
            let _ = self.index.insert_file(file.clone());
            return Err(e.into());
        }
        self.dirty = true;
        Ok(renamed)
    }

    /// Rename a subfolder within this folder.
    pub fn rename_folder(
        &mut self,
        folder: &FolderEntry,
        new_name: &str,
    ) -> Result<FolderEntry, StorageError> {
        self.index.remove_folder(folder);
        let mut renamed = folder.clone();
        renamed.name = new_name.to_string();
        if let Err(e) = self.index.insert_folder(renamed.clone()) {
            let _ = self.index.insert_folder(folder.clone());
            return Err(e.into());
        }
        self.dirty = true;
        Ok(renamed)
    }

    /// Renaming external references is not implemented.
    pub fn rename_external(
        &mut self,
        _external: &crate::index::ExternalEntry,
        _new_name: &str,
    ) -> Result<crate::index::ExternalEntry, StorageError> {
        Err(StorageError::Unimplemented("externals rename"))
    }

    /// Replace the in-memory index with the currently published snapshot.
    ///
    /// Staged mutations and the delete queue are left intact.
    pub async fn reload(&mut self) -> Result<(), StorageError> {
        self.index = self.reload_index().await?;
        Ok(())
    }

    /// Publish this folder's index, reconciling concurrent writers.
    ///
    /// 1. Capture the version fingerprint from before any local persistence.
    /// 2. Commit the index locally.
    /// 3. Re-fetch the published index. Absent (or undecryptable) means
    ///    first publish: no conflict.
    /// 4. If the published version moved past the baseline, another writer
    ///    won the race: adopt their snapshot and
    /// 5. merge every staged mutation into it (insert / superseded /
    ///    conflict-rename), then re-commit locally.
    /// 6. Encrypt and upload the resulting index blob.
    /// 7. Flush the deferred-delete queue; individual failures are logged
    ///    and forgotten.
    /// 8. Clear staged state; the session is clean again.
    ///
    /// On error, staged mutations and the delete queue are untouched and the
    /// commit can be retried.
    pub async fn commit(&mut self) -> Result<(), StorageError> {
        let baseline = self.index.version();
        self.index.commit()?;

        let remote = match self.reload_index().await {
            Ok(index) => Some(index),
            Err(StorageError::NotFound(reason)) => {
                tracing::info!(path = %self.path, %reason, "no published index, first publish");
                None
            }
            Err(e) => return Err(e),
        };

        // the published version has changed from the _old_ version
        if let Some(remote) = remote {
            if remote.version() != baseline {
                tracing::info!(
                    path = %self.path,
                    baseline = ?baseline,
                    published = ?remote.version(),
                    staged = self.staged.len(),
                    "published index changed since baseline, merging"
                );
                // adopt the published snapshot; every local change not
                // re-applied from the staged log is lost
                self.index = remote;
                for update in &self.staged {
                    Self::apply_update(&mut self.index, update)?;
                }
                self.index.commit()?;
            }
        }

        self.upload_index().await?;

        for blob in self.delete_queue.iter() {
            if let Err(err) = self.transfer.delete(blob).await {
                // orphaned blobs do not corrupt the tree; accepted trade-off
                tracing::warn!(%blob, %err, "deferred delete failed");
            }
        }
        self.delete_queue.clear();
        self.staged.clear();
        self.dirty = false;
        Ok(())
    }

    /// Merge one staged mutation into the adopted index.
    ///
    /// - No entry under the staged name: insert it. If the name is held by a
    ///   folder or external, rename with the conflict suffix and retry.
    /// - The published entry equals the mutation's baseline: the edit is
    ///   superseded by published state; nothing to do.
    /// - Anything else is a true conflict: insert the staged entry under its
    ///   conflict name (if that name is free) and drop the stale baseline
    ///   entry if it is still present.
    fn apply_update(index: &mut DirectoryIndex, update: &FileUpdate) -> Result<(), StorageError> {
        let mut entry = update.updated.clone();
        for _ in 0..MAX_MERGE_ATTEMPTS {
            match index.get_file(&entry.name) {
                None => match index.insert_file(entry.clone()) {
                    Ok(()) => return Ok(()),
                    Err(IndexError::NameConflict(name)) => {
                        // a folder or external holds the name
                        tracing::debug!(%name, "kind collision during merge, renaming");
                        entry.name = conflict_name(&entry);
                    }
                    Err(e) => return Err(e.into()),
                },
                Some(existing) if Some(existing) == update.old.as_ref() => {
                    tracing::info!(name = %entry.name, "no conflict for staged entry");
                    return Ok(());
                }
                Some(_) => {
                    entry.name = conflict_name(&entry);
                    tracing::info!(name = %entry.name, "inserting conflict-marked entry");
                    if let Some(old) = &update.old {
                        index.remove_file(old);
                    }
                    if index.get_file(&entry.name).is_some() {
                        return Ok(());
                    }
                    match index.insert_file(entry.clone()) {
                        Ok(()) => return Ok(()),
                        Err(IndexError::NameConflict(_)) => {
                            // conflict name held by a folder or external
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        Err(StorageError::MergeDiverged(update.updated.name.clone()))
    }

    /// Re-fetch and decrypt this folder's index as currently published.
    async fn reload_index(&self) -> Result<DirectoryIndex, StorageError> {
        tracing::debug!(path = %self.path, "reloading directory index");
        let blob = self.blocking_download(self.index.reference()).await?;
        let encrypted = std::fs::read(&blob)?;
        let snapshot = match &self.keys {
            IndexKeys::Folder(key) => match key.decrypt(&encrypted) {
                Ok(bytes) => bytes,
                Err(SecretError::Authentication) => {
                    return Err(StorageError::NotFound("invalid key".to_string()));
                }
                Err(e) => return Err(e.into()),
            },
            IndexKeys::Root => open_sealed(&self.key_pair, &encrypted)?,
        };
        Ok(DirectoryIndex::open(
            &snapshot,
            self.index.device_id(),
            self.index.reference(),
            self.index.temp_dir(),
        )?)
    }

    /// Encrypt and upload this folder's committed index snapshot.
    async fn upload_index(&self) -> Result<(), StorageError> {
        tracing::debug!(path = %self.path, reference = self.index.reference(), "publishing directory index");
        match &self.keys {
            IndexKeys::Folder(key) => {
                let snapshot = std::fs::File::open(self.index.snapshot_path())?;
                self.upload_encrypted(snapshot, key, self.index.reference())
                    .await?;
            }
            IndexKeys::Root => {
                let plaintext = std::fs::read(self.index.snapshot_path())?;
                let sealed = seal(&self.key_pair.public(), &plaintext)?;
                let temp = self.transfer.create_temp_file()?;
                std::fs::write(&temp, &sealed)?;
                self.blocking_upload(self.index.reference(), &temp).await?;
            }
        }
        Ok(())
    }

    /// Encrypt a stream to a temp file and upload it under `blob`.
    ///
    /// Returns `(mtime, size)`: upload completion time in seconds since the
    /// epoch and the encrypted size in bytes.
    async fn upload_encrypted<R: Read>(
        &self,
        content: R,
        key: &Secret,
        blob: &str,
    ) -> Result<(u64, u64), StorageError> {
        let temp = self.transfer.create_temp_file()?;
        let encrypted = key.encrypt_reader(content)?;
        std::fs::write(&temp, &encrypted)?;
        let size = encrypted.len() as u64;
        let mtime = self.blocking_upload(blob, &temp).await?;
        Ok((mtime, size))
    }

    /// Download `name` to a temp file, waiting for completion.
    async fn blocking_download(&self, name: &str) -> Result<PathBuf, StorageError> {
        let dest = self.transfer.create_temp_file()?;
        let op = self.transfer.download(name, &dest);
        self.transfer.wait_for(op).await?;
        Ok(dest)
    }

    /// Upload a local file as `name`, waiting for completion. Returns the
    /// completion time in seconds since the epoch.
    async fn blocking_upload(&self, name: &str, source: &Path) -> Result<u64, StorageError> {
        let op = self.transfer.upload(name, source);
        self.transfer.wait_for(op).await?;
        Ok(now_seconds())
    }
}

/// Deterministic rename for the losing side of a concurrent write: the same
/// `(name, mtime)` always maps to the same conflict name, so merge retries
/// converge instead of looping.
fn conflict_name(entry: &FileEntry) -> String {
    format!("{}_conflict_{}", entry.name, entry.mtime)
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conflict_name_is_deterministic() {
        let entry = FileEntry {
            name: "report.pdf".to_string(),
            block: "b".to_string(),
            key: Secret::generate(),
            mtime: 1_700_000_123,
            size: 1,
        };
        assert_eq!(conflict_name(&entry), "report.pdf_conflict_1700000123");
        assert_eq!(conflict_name(&entry), conflict_name(&entry));
    }
}

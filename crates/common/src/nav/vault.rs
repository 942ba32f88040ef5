use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::crypto::{open_sealed, KeyPair};
use crate::index::DirectoryIndex;
use crate::transfer::TransferManager;

use super::session::{IndexKeys, Navigation};
use super::{StorageError, PATH_SEP};

/// Handle to one encrypted vault: the owner key pair, the device identity,
/// and the transfer backend its blobs live in.
///
/// The vault itself is stateless; it exists to bootstrap root
/// [`Navigation`] sessions. The root index blob name is derived from the
/// owner's public key, so every device holding the key pair resolves the
/// same root without any out-of-band coordination.
pub struct Vault {
    key_pair: KeyPair,
    device_id: Uuid,
    transfer: TransferManager,
    temp_dir: PathBuf,
}

impl Vault {
    /// Create a vault handle.
    ///
    /// `temp_dir` is the local scratch directory index snapshots are staged
    /// in; it must outlive the sessions minted from this vault.
    pub fn new(
        key_pair: KeyPair,
        device_id: Uuid,
        transfer: TransferManager,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Vault {
            key_pair,
            device_id,
            transfer,
            temp_dir: temp_dir.into(),
        }
    }

    /// Blob name of the root directory index: blake3 of the owner's public
    /// key, hex-encoded.
    pub fn root_ref(&self) -> String {
        hex::encode(blake3::hash(&self.key_pair.public().to_bytes()).as_bytes())
    }

    /// Public key of the owning key pair.
    pub fn public_key(&self) -> crate::crypto::PublicKey {
        self.key_pair.public()
    }

    /// Device identity recorded on indices opened through this vault.
    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    /// Scratch directory for index snapshots.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Create and publish a fresh, empty root index.
    ///
    /// Runs through the normal commit protocol, so if a root was already
    /// published (by this or another device) its state wins and is simply
    /// re-published.
    pub async fn init(&self) -> Result<(), StorageError> {
        tracing::info!(root = %self.root_ref(), "initializing vault root");
        let index =
            DirectoryIndex::create_with_reference(self.root_ref(), self.device_id, &self.temp_dir)?;
        let mut root = Navigation::new(
            index,
            IndexKeys::Root,
            self.key_pair.clone(),
            self.transfer.clone(),
            PATH_SEP.to_string(),
        );
        root.commit().await
    }

    /// Download and unseal the root index, returning a session positioned at
    /// `/`.
    ///
    /// Fails with [`StorageError::NotFound`] if no root has been published.
    pub async fn navigate(&self) -> Result<Navigation, StorageError> {
        let root_ref = self.root_ref();
        tracing::debug!(root = %root_ref, "opening vault root");

        let dest = self.transfer.create_temp_file()?;
        let op = self.transfer.download(&root_ref, &dest);
        self.transfer.wait_for(op).await.map_err(StorageError::from)?;

        let encrypted = std::fs::read(&dest)?;
        let snapshot = open_sealed(&self.key_pair, &encrypted)?;
        let index = DirectoryIndex::open(&snapshot, self.device_id, &root_ref, &self.temp_dir)?;
        Ok(Navigation::new(
            index,
            IndexKeys::Root,
            self.key_pair.clone(),
            self.transfer.clone(),
            PATH_SEP.to_string(),
        ))
    }
}

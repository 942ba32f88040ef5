//! Shared test utilities for navigation integration tests
#![allow(dead_code)]

use common::crypto::KeyPair;
use common::nav::Vault;
use common::transfer::TransferManager;
use tempfile::TempDir;
use uuid::Uuid;

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Set up a test environment: an initialized vault over in-memory storage.
pub async fn setup_test_env() -> (Vault, TransferManager, KeyPair, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let key_pair = KeyPair::generate();
    let transfer = TransferManager::memory().await.unwrap();

    let vault = Vault::new(
        key_pair.clone(),
        Uuid::new_v4(),
        transfer.clone(),
        temp_dir.path(),
    );
    vault.init().await.unwrap();

    (vault, transfer, key_pair, temp_dir)
}

/// A second device on the same vault: same key pair and backend, its own
/// device id.
pub fn second_device(key_pair: &KeyPair, transfer: &TransferManager, temp_dir: &TempDir) -> Vault {
    Vault::new(
        key_pair.clone(),
        Uuid::new_v4(),
        transfer.clone(),
        temp_dir.path(),
    )
}

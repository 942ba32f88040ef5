//! Cryptographic primitives for Coffer
//!
//! This module provides the cryptographic foundation for Coffer's security model:
//!
//! - **Identity**: an Ed25519 key pair owns the vault and unseals its root index
//! - **Content encryption**: ChaCha20-Poly1305 with a fresh per-blob `Secret`
//! - **Root sealing**: ECDH-based sealed boxes using X25519 curve conversion
//!
//! # Security Model
//!
//! ## Per-blob keys
//! Every uploaded file block and every subfolder index is encrypted under its
//! own `Secret`, stored in the entry that points at it inside the *parent*
//! directory index. Compromising one key exposes exactly one blob.
//!
//! ## Root index sealing
//! The root directory index has no parent to hold its key, so it is sealed
//! asymmetrically to the owner's public key:
//! 1. Generate an ephemeral Ed25519 key pair
//! 2. Convert both keys to X25519 (Montgomery curve)
//! 3. Perform ECDH and derive a ChaCha20-Poly1305 key from the shared secret
//! 4. Package as `ephemeral_pubkey || nonce || ciphertext`
//!
//! Any device holding the owner key pair can open the root; nothing else can.

mod keys;
mod sealed;
mod secret;

pub use keys::{KeyError, KeyPair, PublicKey, PUBLIC_KEY_SIZE};
pub use sealed::{open_sealed, seal, SealedError};
pub use secret::{Secret, SecretError, NONCE_SIZE, SECRET_SIZE};

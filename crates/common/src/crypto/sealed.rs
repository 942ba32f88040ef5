//! Asymmetric sealing for the root directory index
//!
//! Every subfolder index is encrypted under the folder key stored in its
//! parent, but the root index has no parent. Instead it is *sealed* to the
//! owner's public key:
//!
//! 1. **Generate an ephemeral key pair**: a temporary Ed25519 key pair, used
//!    once and discarded
//! 2. **Perform ECDH**: convert both keys to X25519 and compute a shared
//!    secret
//! 3. **Derive a content key**: run the shared secret plus both public keys
//!    through the blake3 KDF
//! 4. **Encrypt**: ChaCha20-Poly1305 under the derived key
//!
//! The recipient recovers the plaintext by reading the ephemeral public key
//! from the sealed blob, repeating the ECDH with their private key, and
//! deriving the same content key.
//!
//! # Security Properties
//!
//! - **Forward secrecy**: the ephemeral private key is never stored
//! - **Authentication of content**: the AEAD tag rejects tampered blobs
//! - Anyone can seal to a public key; only the key pair holder can open

use super::keys::{KeyError, KeyPair, PublicKey, PUBLIC_KEY_SIZE};
use super::secret::{Secret, SecretError, SECRET_SIZE};

/// KDF context string for deriving the sealing key from the ECDH output
const SEAL_KDF_CONTEXT: &str = "coffer sealed index v1";

/// Errors that can occur while sealing or opening a root index blob
#[derive(Debug, thiserror::Error)]
pub enum SealedError {
    #[error("sealed box error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("authentication failed")]
    Authentication,
}

/// Derive the symmetric sealing key from the ECDH shared secret and both
/// public keys. Binding the public keys into the KDF input ties the
/// ciphertext to this exact sender/recipient pairing.
fn derive_key(shared: &[u8], ephemeral: &PublicKey, recipient: &PublicKey) -> Secret {
    let mut ikm = Vec::with_capacity(SECRET_SIZE + 2 * PUBLIC_KEY_SIZE);
    ikm.extend_from_slice(shared);
    ikm.extend_from_slice(&ephemeral.to_bytes());
    ikm.extend_from_slice(&recipient.to_bytes());
    Secret::from(blake3::derive_key(SEAL_KDF_CONTEXT, &ikm))
}

/// Seal a plaintext to a recipient's public key
///
/// Wire format: `ephemeral_pubkey (32 bytes) || nonce || ciphertext || tag`.
///
/// # Errors
///
/// Returns an error if the recipient key cannot be converted for ECDH or if
/// encryption fails.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, SealedError> {
    let ephemeral = KeyPair::generate();
    let ephemeral_public = ephemeral.public();

    let shared = ephemeral
        .to_x25519()
        .diffie_hellman(&recipient.to_x25519()?);
    let key = derive_key(shared.as_bytes(), &ephemeral_public, recipient);

    let ciphertext = key
        .encrypt(plaintext)
        .map_err(|e| anyhow::anyhow!("seal encrypt error: {}", e))?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + ciphertext.len());
    out.extend_from_slice(&ephemeral_public.to_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed blob with the recipient's key pair
///
/// # Errors
///
/// Returns [`SealedError::Authentication`] if the blob was sealed to a
/// different key pair, was corrupted, or was tampered with.
pub fn open_sealed(recipient: &KeyPair, sealed: &[u8]) -> Result<Vec<u8>, SealedError> {
    if sealed.len() < PUBLIC_KEY_SIZE {
        return Err(anyhow::anyhow!("sealed data too short for ephemeral key").into());
    }

    let ephemeral_public = PublicKey::try_from(&sealed[..PUBLIC_KEY_SIZE])?;
    let shared = recipient
        .to_x25519()
        .diffie_hellman(&ephemeral_public.to_x25519()?);
    let key = derive_key(shared.as_bytes(), &ephemeral_public, &recipient.public());

    match key.decrypt(&sealed[PUBLIC_KEY_SIZE..]) {
        Ok(plaintext) => Ok(plaintext),
        Err(SecretError::Authentication) => Err(SealedError::Authentication),
        Err(e) => Err(anyhow::anyhow!("seal decrypt error: {}", e).into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let owner = KeyPair::generate();
        let plaintext = b"the root index snapshot bytes";

        let sealed = seal(&owner.public(), plaintext).unwrap();
        let opened = open_sealed(&owner, &sealed).unwrap();

        assert_eq!(plaintext.to_vec(), opened);
    }

    #[test]
    fn test_open_with_wrong_keypair_fails() {
        let owner = KeyPair::generate();
        let other = KeyPair::generate();

        let sealed = seal(&owner.public(), b"secret bytes").unwrap();
        let result = open_sealed(&other, &sealed);

        assert!(matches!(result, Err(SealedError::Authentication)));
    }

    #[test]
    fn test_tampered_sealed_blob_fails() {
        let owner = KeyPair::generate();
        let mut sealed = seal(&owner.public(), b"secret bytes").unwrap();

        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;

        assert!(matches!(
            open_sealed(&owner, &sealed),
            Err(SealedError::Authentication)
        ));
    }

    #[test]
    fn test_sealed_blobs_are_unique_per_seal() {
        // Fresh ephemeral key and nonce every time
        let owner = KeyPair::generate();
        let a = seal(&owner.public(), b"same plaintext").unwrap();
        let b = seal(&owner.public(), b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}

//! Token Encryption
//!
//! AES-256-GCM sealing for tokens persisted by [`EncryptedFileTokenStorage`](super::EncryptedFileTokenStorage).

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::error::{StorageError, YnabResult};

/// Symmetric cipher keyed from an arbitrary caller secret.
///
/// The AES key is the SHA-256 digest of the caller key. Sealed output is
/// `nonce || ciphertext || tag`. An empty caller key disables encryption and
/// both directions return the input unchanged.
pub struct TokenCipher {
    key: Option<LessSafeKey>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Create a cipher from a caller-supplied key.
    pub fn new(key: &[u8]) -> YnabResult<Self> {
        let key = if key.is_empty() {
            tracing::warn!("Empty encryption key, tokens will be stored in plaintext");
            None
        } else {
            let digest = Sha256::digest(key);
            let unbound = UnboundKey::new(&AES_256_GCM, digest.as_slice()).map_err(|_| {
                StorageError::EncryptionFailed {
                    message: "invalid key material".to_string(),
                }
            })?;
            Some(LessSafeKey::new(unbound))
        };

        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    /// Whether encryption is active.
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Seal plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> YnabResult<Vec<u8>> {
        let Some(key) = &self.key else {
            return Ok(plaintext.to_vec());
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StorageError::EncryptionFailed {
                message: "failed to generate nonce".to_string(),
            })?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| StorageError::EncryptionFailed {
            message: "seal failed".to_string(),
        })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(sealed)
    }

    /// Open sealed data. Fails on a wrong key or tampered input.
    pub fn decrypt(&self, sealed: &[u8]) -> YnabResult<Vec<u8>> {
        let Some(key) = &self.key else {
            return Ok(sealed.to_vec());
        };

        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(StorageError::DecryptionFailed {
                message: format!("ciphertext too short: {} bytes", sealed.len()),
            }
            .into());
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| {
            StorageError::DecryptionFailed {
                message: "invalid nonce".to_string(),
            }
        })?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::DecryptionFailed {
                message: "authentication failed (wrong key or corrupted data)".to_string(),
            })?;

        Ok(plaintext.to_vec())
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

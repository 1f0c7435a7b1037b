//! AES-256-GCM encryption of secure settings.
//!
//! Ciphertexts are laid out as `nonce || ciphertext`, where the nonce is a
//! fresh random 96-bit value per call and the ciphertext includes the GCM tag.

use crate::core::EncryptionService;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

const NONCE_SIZE: usize = 12;
const KEY_CONTEXT: &str = "contactpoints secure settings v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("malformed secure value: {0}")]
    Malformed(String),
}

/// An `EncryptionService` backed by a single AES-256-GCM key.
pub struct AesGcmEncryption {
    key: Zeroizing<[u8; 32]>,
}

impl AesGcmEncryption {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Derives the key from a configured secret string.
    pub fn from_secret(secret: &str) -> Self {
        Self::new(blake3::derive_key(KEY_CONTEXT, secret.as_bytes()))
    }

    fn cipher(&self) -> Result<Aes256Gcm, String> {
        Aes256Gcm::new_from_slice(&*self.key).map_err(|e| format!("cipher init failed: {}", e))
    }
}

#[async_trait]
impl EncryptionService for AesGcmEncryption {
    async fn encrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let cipher = self.cipher().map_err(EncryptionError::Encrypt)?;
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload)
            .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if payload.len() < NONCE_SIZE {
            return Err(EncryptionError::Malformed(format!(
                "payload of {} bytes is shorter than the nonce",
                payload.len()
            )));
        }
        let cipher = self.cipher().map_err(EncryptionError::Decrypt)?;
        let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| EncryptionError::Decrypt(e.to_string()))
    }
}

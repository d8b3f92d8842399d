//! Encryption of account payloads at rest.
//!
//! Account titles and descriptions are serialized to JSON and encrypted before
//! they reach the store. [`DataCrypto`] is the seam; [`AesGcmCrypto`] is the
//! shipped implementation: AES-256-GCM with a key derived by SHA-256 from a
//! configured secret, and a random 96-bit nonce prefixed to every ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Encrypts and decrypts opaque byte payloads
#[async_trait]
pub trait DataCrypto: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Serializes `record` to JSON and encrypts it
pub async fn encrypt_record<T>(crypto: &dyn DataCrypto, record: &T) -> Result<Vec<u8>, CryptoError>
where
    T: Serialize + ?Sized,
{
    let plaintext = serde_json::to_vec(record)?;
    crypto.encrypt(&plaintext).await
}

/// Decrypts `data` and deserializes it from JSON
pub async fn decrypt_record<T>(crypto: &dyn DataCrypto, data: &[u8]) -> Result<T, CryptoError>
where
    T: DeserializeOwned,
{
    let plaintext = crypto.decrypt(data).await?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// AES-256-GCM with a secret-derived key
#[derive(Clone)]
pub struct AesGcmCrypto {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCrypto").finish_non_exhaustive()
    }
}

impl AesGcmCrypto {
    /// Derives a 256-bit key from `secret` with SHA-256
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"keystead-account-data-v1:");
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();

        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    fn open(&self, combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if combined.len() < NONCE_SIZE {
            return Err(CryptoError::Decrypt("Encrypted data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

#[async_trait]
impl DataCrypto for AesGcmCrypto {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.seal(plaintext)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.open(ciphertext)
    }
}

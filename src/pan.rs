//! At-rest encryption for primary account numbers.
//!
//! AES-256-GCM with a random nonce prepended to the ciphertext, the whole
//! blob base64-encoded. The rest of the service treats the output as an
//! opaque string and never inspects it.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::error::AppError;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct PanCipher {
    cipher: Aes256Gcm,
}

impl PanCipher {
    /// Expects a base64-encoded 32-byte key.
    pub fn from_base64_key(key_base64: &str) -> anyhow::Result<Self> {
        let key = BASE64
            .decode(key_base64.trim())
            .map_err(|e| anyhow::anyhow!("PAN key is not valid base64: {}", e))?;
        if key.len() != 32 {
            anyhow::bail!("PAN key must be 32 bytes, got {}", key.len());
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("Failed to initialize PAN cipher: {}", e))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, pan: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, pan.as_bytes())
            .map_err(|_| AppError::Internal("PAN encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, AppError> {
        let blob = BASE64
            .decode(encrypted)
            .map_err(|_| AppError::Internal("Invalid PAN ciphertext encoding".to_string()))?;
        if blob.len() <= NONCE_LEN {
            return Err(AppError::Internal("PAN ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Internal("PAN decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Internal("Decrypted PAN is not valid UTF-8".to_string()))
    }
}

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
    Nonce,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Failed to decode key: {0}")]
    KeyDecodeError(String),
    #[error("Failed to create cipher: {0}")]
    CipherError(String),
    #[error("Encryption failed: {0}")]
    EncryptionError(String),
    #[error("Decryption failed: {0}")]
    DecryptionError(String),
    #[error("Invalid UTF-8: {0}")]
    Utf8Error(String),
    #[error("Invalid encrypted data")]
    InvalidData,
}

/// AES-256-GCM with a random 96-bit nonce prepended to each ciphertext.
#[derive(Clone)]
pub struct Cipher {
    inner: Aes256Gcm,
}

impl Cipher {
    /// `key_b64` must decode to exactly 32 bytes.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, EncryptionError> {
        let key = BASE64.decode(key_b64)
            .map_err(|e| EncryptionError::KeyDecodeError(e.to_string()))?;
        Self::from_key_bytes(&key)
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, EncryptionError> {
        let inner = Aes256Gcm::new_from_slice(key)
            .map_err(|e| EncryptionError::CipherError(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encrypts a string, returning base64 of nonce || ciphertext.
    pub fn encrypt(&self, value: &str) -> Result<String, EncryptionError> {
        let mut rng = rand::thread_rng();
        let mut nonce_bytes = [0u8; 12];
        rng.fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self.inner
            .encrypt(nonce, value.as_bytes())
            .map_err(|e| EncryptionError::EncryptionError(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);

        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, EncryptionError> {
        let encrypted_data = BASE64.decode(encrypted)
            .map_err(|e| EncryptionError::KeyDecodeError(e.to_string()))?;

        if encrypted_data.len() < 12 {
            return Err(EncryptionError::InvalidData);
        }

        let (nonce_bytes, ciphertext) = encrypted_data.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self.inner
            .decrypt(nonce, ciphertext)
            .map_err(|e| EncryptionError::DecryptionError(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| EncryptionError::Utf8Error(e.to_string()))
    }
}

/// Key/value store whose values are sealed with [`Cipher`]. Reads that fail
/// authentication come back as `None`, the same as a missing key.
pub struct SecureStorage {
    cipher: Cipher,
    items: DashMap<String, String>,
}

impl SecureStorage {
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher, items: DashMap::new() }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), EncryptionError> {
        let sealed = self.cipher.encrypt(value)?;
        self.items.insert(key.to_string(), sealed);
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        let sealed = self.items.get(key)?.value().clone();
        match self.cipher.decrypt(&sealed) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Failed to retrieve secure item {}: {}", key, e);
                None
            }
        }
    }

    pub fn remove_item(&self, key: &str) {
        self.items.remove(key);
    }

    /// Keeps only the items whose key passes `keep`. Returns how many were dropped.
    pub fn retain_keys<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|key, _| keep(key));
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn raw_item(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.value().clone())
    }

    #[cfg(test)]
    pub(crate) fn overwrite_raw(&self, key: &str, raw: &str) {
        self.items.insert(key.to_string(), raw.to_string());
    }
}

//! At-rest encryption of item content.
//!
//! The key artifact holds 32 raw bytes for AES-256-GCM. It is created on
//! first use and never rotated; losing it makes every stored record
//! unreadable. Each ciphertext is `nonce (12 bytes) || ciphertext+tag`.

use std::fs;
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use tracing::info;
use zeroize::Zeroizing;

use crate::error::StoreError;

pub const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    pub fn from_key(key: &[u8]) -> Result<Self, StoreError> {
        let aead = Aes256Gcm::new_from_slice(key).map_err(|_| {
            StoreError::Key(format!("expected {} key bytes, got {}", KEY_SIZE, key.len()))
        })?;
        Ok(Self { aead })
    }

    /// Loads the key at `path`, generating and persisting a fresh one if absent.
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            let key = Zeroizing::new(fs::read(path)?);
            return Self::from_key(&key);
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        write_key_file(path, key.as_slice())?;
        info!(path = %path.display(), "generated new encryption key");
        Self::from_key(key.as_slice())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| StoreError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<String, StoreError> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StoreError::DecryptionFailed(format!(
                "ciphertext too short ({} bytes)",
                blob.len()
            )));
        }
        let (nonce, sealed) = blob.split_at(NONCE_SIZE);
        let plain = self
            .aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|e| StoreError::DecryptionFailed(e.to_string()))?;
        String::from_utf8(plain).map_err(|e| StoreError::DecryptionFailed(e.to_string()))
    }
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(key)?;
    file.sync_all()?;
    Ok(())
}

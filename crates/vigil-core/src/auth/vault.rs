//! Encrypting replay secrets at rest
//!
//! A queued registration must be replayed later with the password the user typed, so
//! it cannot be stored as a one-way hash. [`SecretVault`] seals it with AES-256-GCM
//! under a device key; the sealed form is `base64(nonce || ciphertext)` and fits in a
//! TEXT column. The key comes from `VIGIL_SECRET_KEY` (base64, 32 bytes) or from a
//! key file created on first use.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{Error, Result};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Symmetric sealing of secrets with a device-local key
#[derive(Clone)]
pub struct SecretVault {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVault").finish_non_exhaustive()
    }
}

impl SecretVault {
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Fresh random key, nothing persisted
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Decode a base64 key (the `VIGIL_SECRET_KEY` format)
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::config(format!("Invalid secret key encoding: {}", e)))?;
        if bytes.len() != KEY_LEN {
            return Err(Error::config(format!(
                "Secret key must be {} bytes, got {} bytes",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Read the key file at `path`, creating it with a random key if missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path)?;
            return Self::from_base64(&encoded);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let vault = Self::generate();
        std::fs::write(path, vault.to_base64())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        log::info!("Created new secret key at {}", path.display());
        Ok(vault)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    /// Encrypt `plaintext` with a fresh random nonce
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::crypto(format!("Encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a value produced by [`SecretVault::seal`]
    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| Error::crypto(format!("Invalid sealed secret: {}", e)))?;
        if bytes.len() <= NONCE_LEN {
            return Err(Error::crypto("Sealed secret is truncated"));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| Error::crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| Error::crypto(e.to_string()))
    }

    /// Key for signing session tokens, kept distinct from the sealing key
    pub fn session_key(&self) -> [u8; KEY_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(b"vigil-session-v1");
        hasher.update(self.key);
        let digest = hasher.finalize();
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        key
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| Error::crypto(format!("Failed to create cipher: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let vault = SecretVault::generate();
        let sealed = vault.seal("pw1").unwrap();
        assert_ne!(sealed, "pw1");
        assert_eq!(vault.open(&sealed).unwrap(), "pw1");
    }

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let vault = SecretVault::generate();
        assert_ne!(vault.seal("same").unwrap(), vault.seal("same").unwrap());
    }

    #[test]
    fn test_open_with_other_key_fails() {
        let sealed = SecretVault::generate().seal("pw1").unwrap();
        let result = SecretVault::generate().open(&sealed);
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_open_truncated_fails() {
        let vault = SecretVault::generate();
        assert!(vault.open(&BASE64.encode([0u8; 4])).is_err());
        assert!(vault.open("%%%").is_err());
    }

    #[test]
    fn test_from_base64_rejects_short_key() {
        let result = SecretVault::from_base64(&BASE64.encode([1u8; 16]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_or_create_persists_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("vigil.key");

        let first = SecretVault::load_or_create(&path).unwrap();
        let sealed = first.seal("pw1").unwrap();

        let second = SecretVault::load_or_create(&path).unwrap();
        assert_eq!(second.open(&sealed).unwrap(), "pw1");
        assert_eq!(first.to_base64(), second.to_base64());
    }

    #[test]
    fn test_session_key_differs_from_sealing_key() {
        let vault = SecretVault::from_key([7u8; KEY_LEN]);
        assert_ne!(vault.session_key(), [7u8; KEY_LEN]);
        assert_eq!(vault.session_key(), vault.session_key());
    }
}

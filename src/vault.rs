//! Mailbox secret encryption at rest.
//!
//! AES-256-GCM with a PBKDF2-HMAC-SHA-256 key derived from the
//! application-wide secret. Blob layout: base64 of `[IV (12)] [ciphertext+tag]`.
//!
//! All records share one derivation salt, so the derived key is the same for
//! every blob under a given app secret. Derivation parameters are injected
//! through [`VaultParams`] rather than hardcoded, which also lets tests run
//! with a cheaper iteration count.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::Rng;
use sha2::Sha256;
use thiserror::Error;

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Fixed application-wide derivation salt. Shared by all records; key
/// strength rests entirely on the app secret's entropy.
const DEFAULT_SALT: &[u8] = b"mailtrack-credential-salt";
const DEFAULT_ITERATIONS: u32 = 100_000;

/// Key derivation parameters.
#[derive(Debug, Clone)]
pub struct VaultParams {
    pub iterations: u32,
    pub salt: Vec<u8>,
}

impl Default for VaultParams {
    fn default() -> Self {
        VaultParams {
            iterations: DEFAULT_ITERATIONS,
            salt: DEFAULT_SALT.to_vec(),
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Authentication-tag verification failed or the blob is structurally
    /// invalid. Never masked: the caller must treat the credential as
    /// unusable rather than retry with the same inputs.
    #[error("decryption failed: wrong secret or corrupted data")]
    Decryption,
}

/// Encrypts and decrypts stored mailbox secrets.
///
/// Stateless between calls; the key is derived once at construction since
/// both the app secret and the derivation parameters are immutable for the
/// vault's lifetime.
pub struct Vault {
    key: [u8; KEY_SIZE],
}

impl Vault {
    pub fn new(app_secret: &str, params: VaultParams) -> Vault {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            app_secret.as_bytes(),
            &params.salt,
            params.iterations,
            &mut key,
        );
        Vault { key }
    }

    /// Encrypt a plaintext secret into a base64 blob.
    ///
    /// A fresh random 96-bit IV is generated per call; it is never reused
    /// for the same key.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill(&mut iv);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| VaultError::Encrypt(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| VaultError::Encrypt(e.to_string()))?;

        let mut blob = Vec::with_capacity(IV_SIZE + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);

        Ok(B64.encode(&blob))
    }

    /// Decrypt a base64 blob back to the original plaintext.
    ///
    /// Fails closed: a wrong secret, tampered data, or a value that was
    /// never encrypted (legacy plaintext) all yield [`VaultError::Decryption`].
    pub fn decrypt(&self, blob: &str) -> Result<String, VaultError> {
        let data = B64.decode(blob).map_err(|_| VaultError::Decryption)?;
        if data.len() < IV_SIZE + TAG_SIZE {
            return Err(VaultError::Decryption);
        }

        let (iv, ciphertext) = data.split_at(IV_SIZE);

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| VaultError::Decryption)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| VaultError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decryption)
    }

    /// Heuristic legacy-migration check: does this look like an encrypted
    /// blob rather than a plaintext secret written before encryption was
    /// introduced?
    ///
    /// Base64-decodability plus a minimum length, not a format tag; a short
    /// base64-looking plaintext can be misclassified.
    pub fn is_encrypted(&self, text: &str) -> bool {
        text.len() > 20 && B64.decode(text).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault(secret: &str) -> Vault {
        // keep unit tests fast; the KDF itself is exercised either way
        let params = VaultParams {
            iterations: 1_000,
            ..Default::default()
        };
        Vault::new(secret, params)
    }

    #[test]
    fn roundtrip() {
        let vault = test_vault("app-secret");
        let blob = vault.encrypt("hunter2").unwrap();
        assert_ne!(blob, "hunter2");
        assert_eq!(vault.decrypt(&blob).unwrap(), "hunter2");
    }

    #[test]
    fn roundtrip_utf8() {
        let vault = test_vault("app-secret");
        let plaintext = "pässwörd → 秘密 🔐";
        let blob = vault.encrypt(plaintext).unwrap();
        assert_eq!(vault.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_per_call() {
        let vault = test_vault("app-secret");
        let a = vault.encrypt("same input").unwrap();
        let b = vault.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_secret_fails_closed() {
        let blob = test_vault("secret-one").encrypt("payload").unwrap();
        let result = test_vault("secret-two").decrypt(&blob);
        assert!(matches!(result, Err(VaultError::Decryption)));
    }

    #[test]
    fn tampered_blob_fails() {
        let vault = test_vault("app-secret");
        let blob = vault.encrypt("payload").unwrap();

        let mut raw = B64.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 1;
        let tampered = B64.encode(&raw);

        assert!(matches!(vault.decrypt(&tampered), Err(VaultError::Decryption)));
    }

    #[test]
    fn legacy_plaintext_fails_decryption() {
        let vault = test_vault("app-secret");
        assert!(vault.decrypt("plain old password").is_err());
        assert!(vault.decrypt("").is_err());
    }

    #[test]
    fn is_encrypted_heuristic() {
        let vault = test_vault("app-secret");
        let blob = vault.encrypt("some secret value").unwrap();
        assert!(vault.is_encrypted(&blob));

        assert!(!vault.is_encrypted("short"));
        assert!(!vault.is_encrypted("definitely not base64!!"));
        // known misclassification: long base64-looking plaintext
        assert!(vault.is_encrypted("aaaaaaaaaaaaaaaaaaaaaaaa"));
    }
}

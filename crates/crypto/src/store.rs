//! Secret-at-rest storage policy
//!
//! API credentials are stored encrypted by a machine-scoped symmetric
//! primitive (DPAPI on Windows, a root-only key file on Linux). The
//! primitive is a collaborator behind `MachineCipher`; this module owns
//! the policy around it: encrypted-first reads, a plaintext migration
//! fallback with a one-time warning, and zeroing of every decrypted
//! buffer.

use std::sync::atomic::{AtomicBool, Ordering};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Ciphertext is not valid base64")]
    InvalidEncoding,

    #[error("Ciphertext too short")]
    CiphertextTooShort,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,

    #[error("No secret configured (neither encrypted nor plaintext value present)")]
    MissingSecret,
}

/// Machine-scoped symmetric encryption primitive.
///
/// The host supplies the real implementation (DPAPI, OS keyring). The
/// in-crate `LocalKeyCipher` covers Linux hosts and tests.
pub trait MachineCipher: Send + Sync {
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// AES-256-GCM cipher keyed from a file-permission-guarded machine key.
/// Blob layout: nonce (12 bytes) || ciphertext.
pub struct LocalKeyCipher {
    cipher: Aes256Gcm,
}

impl LocalKeyCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key).expect("key length is 32");
        Self { cipher }
    }
}

impl MachineCipher for LocalKeyCipher {
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < 12 {
            return Err(CryptoError::CiphertextTooShort);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Policy wrapper around the machine cipher.
pub struct SecretStore<C: MachineCipher> {
    cipher: C,
    plaintext_warned: AtomicBool,
}

impl<C: MachineCipher> SecretStore<C> {
    pub fn new(cipher: C) -> Self {
        Self {
            cipher,
            plaintext_warned: AtomicBool::new(false),
        }
    }

    /// Encrypt a secret for storage, base64 encoded.
    ///
    /// An empty input yields an empty string without touching the
    /// primitive, so "unset" round-trips as "unset".
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let blob = self.cipher.protect(plaintext.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    /// Decrypt a stored secret. The result zeroes itself on drop.
    pub fn decrypt(&self, encrypted: &str) -> Result<Zeroizing<String>, CryptoError> {
        if encrypted.is_empty() {
            return Ok(Zeroizing::new(String::new()));
        }
        let blob = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|_| CryptoError::InvalidEncoding)?;

        let mut plain = self.cipher.unprotect(&blob)?;
        let result = match String::from_utf8(plain.clone()) {
            Ok(s) => Ok(Zeroizing::new(s)),
            Err(_) => Err(CryptoError::InvalidUtf8),
        };
        plain.zeroize();
        result
    }

    /// Resolve a secret from its config values: encrypted first, then
    /// the legacy plaintext value. Using the plaintext path emits a
    /// one-time insecure-configuration warning per store.
    pub fn load_secret(
        &self,
        encrypted: Option<&str>,
        plaintext: Option<&str>,
    ) -> Result<Zeroizing<String>, CryptoError> {
        if let Some(enc) = encrypted.filter(|e| !e.is_empty()) {
            let secret = self.decrypt(enc)?;
            if !secret.is_empty() {
                return Ok(secret);
            }
        }

        if let Some(plain) = plaintext.filter(|p| !p.is_empty()) {
            if !self.plaintext_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    target: "audit",
                    "insecure configuration: plaintext secret in use, encrypt it for storage"
                );
            }
            return Ok(Zeroizing::new(plain.to_string()));
        }

        Err(CryptoError::MissingSecret)
    }
}

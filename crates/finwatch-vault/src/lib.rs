//! Credential vault for FinWatch
//!
//! This crate seals and opens stored payment credentials with AES-256-GCM.
//! The key is loaded once at process startup from configuration and shared
//! read-only across tasks; it is never regenerated implicitly and never
//! written to the store.
//!
//! # Examples
//!
//! ```
//! use finwatch_core::models::CardDetails;
//! use finwatch_vault::{Vault, VaultKey};
//!
//! let vault = Vault::new(VaultKey::generate());
//! let card = CardDetails {
//!     number: "4242 4242 4242 4242".into(),
//!     expiry_month: 12,
//!     expiry_year: 2032,
//!     cvv: "314".into(),
//!     holder_name: "Jane Doe".into(),
//! };
//!
//! let blob = vault.seal(&card)?;
//! assert_eq!(vault.open(&blob)?, card);
//! # Ok::<(), finwatch_core::AppError>(())
//! ```

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use finwatch_core::models::CardDetails;
use finwatch_core::{AppError, AppResult};
use std::fmt;
use tracing::{debug, error};

/// AES-256-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Symmetric vault key (32 bytes)
///
/// `Debug` redacts the key material.
#[derive(Clone)]
pub struct VaultKey([u8; 32]);

impl VaultKey {
    /// Generate a fresh random key from the OS RNG
    ///
    /// Intended for provisioning and tests; production keys come from
    /// configuration via [`VaultKey::from_base64`].
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self(key.into())
    }

    /// Decode a key from its base64 configuration form
    pub fn from_base64(encoded: &str) -> AppResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Config(format!("Invalid vault key encoding: {}", e)))?;

        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Config("Vault key must be exactly 32 bytes".into()))?;

        Ok(Self(key))
    }

    /// Encode the key for storage in a secured configuration source
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(***)")
    }
}

/// Credential vault
///
/// Seals `CardDetails` into an opaque nonce-prefixed blob and opens blobs
/// back into plaintext fields. Opening fails with `AppError::Decryption`
/// when the blob was sealed under a different key or is corrupted; callers
/// must treat that as a billing failure for the affected user, not a crash.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Create a vault over the given key
    pub fn new(key: VaultKey) -> Self {
        let key = Key::<Aes256Gcm>::from(key.0);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt card details into an opaque blob
    ///
    /// Each call uses a fresh random nonce; the blob layout is
    /// `nonce || ciphertext`.
    pub fn seal(&self, card: &CardDetails) -> AppResult<Vec<u8>> {
        debug!("Sealing credential");

        let plaintext = serde_json::to_vec(card)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_slice()).map_err(|e| {
            error!("Failed to seal credential: {}", e);
            AppError::Internal(format!("Credential encryption failed: {}", e))
        })?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a sealed blob back into card details
    pub fn open(&self, blob: &[u8]) -> AppResult<CardDetails> {
        if blob.len() <= NONCE_LEN {
            return Err(AppError::Decryption("Sealed blob is truncated".into()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Decryption("Wrong key or corrupted blob".into()))?;

        let card = serde_json::from_slice(&plaintext)
            .map_err(|e| AppError::Decryption(format!("Sealed payload malformed: {}", e)))?;

        Ok(card)
    }
}

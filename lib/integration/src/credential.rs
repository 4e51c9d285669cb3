//! Credential vault for secure credential storage.
//!
//! All integration credentials are encrypted at rest with ChaCha20-Poly1305.
//! Envelopes carry the id of the sealing key, so keys can be rotated while
//! old envelopes remain decryptable. No plaintext credentials are stored in
//! configuration or logs.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use std::collections::HashMap;

use crate::config::CredentialEnvelope;
use crate::error::CredentialError;

/// Envelope format version. Bumped if the sealing scheme changes.
const ENVELOPE_VERSION: &str = "v1";

/// Length of the ChaCha20-Poly1305 nonce in bytes.
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts credential blobs under a keyring of named keys.
///
/// New envelopes are sealed with the active key; envelopes sealed under any
/// loaded key remain decryptable.
pub struct CredentialVault {
    keys: HashMap<String, [u8; 32]>,
    active: String,
}

impl CredentialVault {
    /// Creates a vault with a single key, which becomes the active key.
    #[must_use]
    pub fn new(key_id: impl Into<String>, key: [u8; 32]) -> Self {
        let active = key_id.into();
        let mut keys = HashMap::new();
        keys.insert(active.clone(), key);
        Self { keys, active }
    }

    /// Creates a vault with a freshly generated random key.
    ///
    /// Suitable for tests and ephemeral deployments; persisted envelopes
    /// will not survive a restart with a different key.
    #[must_use]
    pub fn generate(key_id: impl Into<String>) -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key_id, key)
    }

    /// Adds a decryption key to the keyring without changing the active key.
    pub fn add_key(&mut self, key_id: impl Into<String>, key: [u8; 32]) {
        self.keys.insert(key_id.into(), key);
    }

    /// The id of the key used to seal new envelopes.
    #[must_use]
    pub fn active_key_id(&self) -> &str {
        &self.active
    }

    /// Seals a plaintext blob into an envelope under the active key.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher rejects the key or plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CredentialEnvelope, CredentialError> {
        let key = self
            .keys
            .get(&self.active)
            .ok_or_else(|| CredentialError::UnknownKey {
                key_id: self.active.clone(),
            })?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let aead = ChaCha20Poly1305::new_from_slice(key).map_err(|e| {
            CredentialError::EncryptionFailed {
                reason: e.to_string(),
            }
        })?;
        let ciphertext =
            aead.encrypt(nonce, plaintext)
                .map_err(|e| CredentialError::EncryptionFailed {
                    reason: e.to_string(),
                })?;

        let cipher = format!(
            "{ENVELOPE_VERSION}:{}:{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext)
        );

        Ok(CredentialEnvelope {
            cipher,
            key_id: self.active.clone(),
        })
    }

    /// Opens an envelope and returns the plaintext.
    ///
    /// # Errors
    ///
    /// Fails loudly on an unknown key id, a malformed envelope, or a
    /// ciphertext that does not authenticate; corrupted data is never
    /// returned.
    pub fn decrypt(&self, envelope: &CredentialEnvelope) -> Result<Vec<u8>, CredentialError> {
        let key = self
            .keys
            .get(&envelope.key_id)
            .ok_or_else(|| CredentialError::UnknownKey {
                key_id: envelope.key_id.clone(),
            })?;

        let mut parts = envelope.cipher.split(':');
        let version = parts.next().unwrap_or_default();
        let nonce_b64 = parts.next().unwrap_or_default();
        let ciphertext_b64 = parts.next().unwrap_or_default();

        if version != ENVELOPE_VERSION || parts.next().is_some() {
            return Err(CredentialError::InvalidFormat {
                reason: format!("expected '{ENVELOPE_VERSION}:<nonce>:<ciphertext>'"),
            });
        }

        let nonce_bytes =
            URL_SAFE_NO_PAD
                .decode(nonce_b64)
                .map_err(|e| CredentialError::InvalidFormat {
                    reason: format!("bad nonce encoding: {e}"),
                })?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CredentialError::InvalidFormat {
                reason: format!("nonce must be {NONCE_LEN} bytes"),
            });
        }
        let ciphertext =
            URL_SAFE_NO_PAD
                .decode(ciphertext_b64)
                .map_err(|e| CredentialError::InvalidFormat {
                    reason: format!("bad ciphertext encoding: {e}"),
                })?;

        let aead = ChaCha20Poly1305::new_from_slice(key).map_err(|e| {
            CredentialError::DecryptionFailed {
                reason: e.to_string(),
            }
        })?;

        aead.decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| CredentialError::DecryptionFailed {
                reason: "ciphertext failed authentication".to_string(),
            })
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("active", &self.active)
            .field("key_ids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! AES-256-GCM sealing of identity mappings.
//!
//! The exchange ID, pseudonym and format version are bound into the associated
//! data, so a sealed blob cannot be moved to another exchange or pseudonym
//! without failing authentication.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use chrono::{DateTime, Utc};
use rand::RngCore;

use swapdrop_core::constants::{DOMAIN_MAPPING_AAD, MAPPING_NONCE_SIZE, MAPPING_VERSION};
use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::types::{EncryptedMapping, ExchangeId, MappingRecord, Pseudonym};

use crate::hash::shake256_multi;
use crate::secret::SupportKey;

/// Seals and opens [`MappingRecord`]s under the support key.
#[derive(Clone, Debug)]
pub struct MappingSealer {
    key: SupportKey,
}

impl MappingSealer {
    /// Creates a sealer for `key`.
    pub fn new(key: SupportKey) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| SwapError::EncryptionUnavailable(format!("invalid cipher key: {}", e)))
    }

    fn aad(version: u8, exchange_id: &ExchangeId, pseudonym: &Pseudonym) -> Vec<u8> {
        shake256_multi(
            DOMAIN_MAPPING_AAD,
            &[&[version], exchange_id.as_str().as_bytes(), pseudonym.as_str().as_bytes()],
            32,
        )
    }

    /// Encrypts `plaintext` with a fresh random nonce; output is `nonce || ciphertext`.
    pub fn seal_bytes(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; MAPPING_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|_| SwapError::EncryptionUnavailable("mapping encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(MAPPING_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypts a `nonce || ciphertext` blob.
    pub fn open_bytes(&self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() <= MAPPING_NONCE_SIZE {
            return Err(SwapError::DecryptionFailed("sealed mapping is truncated".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(MAPPING_NONCE_SIZE);

        self.cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
            .map_err(|_| SwapError::DecryptionFailed("mapping authentication failed".into()))
    }

    /// Seals a mapping record.
    pub fn seal(&self, record: &MappingRecord, now: DateTime<Utc>) -> Result<EncryptedMapping> {
        let plaintext = serde_json::to_vec(record)?;
        let aad = Self::aad(MAPPING_VERSION, &record.exchange_id, &record.pseudonym);
        let sealed = self.seal_bytes(&plaintext, &aad)?;

        Ok(EncryptedMapping {
            version: MAPPING_VERSION,
            exchange_id: record.exchange_id.clone(),
            pseudonym: record.pseudonym.clone(),
            sealed,
            created_at: now,
            expires_at: None,
        })
    }

    /// Opens a sealed mapping and checks that its contents match the envelope.
    pub fn open(&self, mapping: &EncryptedMapping) -> Result<MappingRecord> {
        if mapping.version != MAPPING_VERSION {
            return Err(SwapError::VersionMismatch {
                expected: MAPPING_VERSION,
                actual: mapping.version,
            });
        }
        let aad = Self::aad(mapping.version, &mapping.exchange_id, &mapping.pseudonym);
        let plaintext = self.open_bytes(&mapping.sealed, &aad)?;
        let record: MappingRecord = serde_json::from_slice(&plaintext)
            .map_err(|e| SwapError::DecryptionFailed(format!("malformed mapping record: {}", e)))?;

        if record.exchange_id != mapping.exchange_id || record.pseudonym != mapping.pseudonym {
            return Err(SwapError::DecryptionFailed("mapping envelope mismatch".into()));
        }
        Ok(record)
    }
}

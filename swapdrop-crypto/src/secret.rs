//! Secret key material.
//!
//! Both key types zeroize on drop and never print their bytes.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use swapdrop_core::constants::{SERVER_SECRET_MIN_SIZE, SUPPORT_KEY_SIZE};
use swapdrop_core::error::{Result, SwapError};

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER SECRET
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-wide secret keying pseudonym and withdrawal-code derivation.
///
/// Rotating it changes every future pseudonym; stored exchanges keep the
/// values they were created with.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerSecret {
    bytes: Vec<u8>,
}

impl ServerSecret {
    /// Wraps raw secret bytes.
    ///
    /// # Errors
    /// Returns `InvalidKeySize` if shorter than 32 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < SERVER_SECRET_MIN_SIZE {
            return Err(SwapError::InvalidKeySize {
                expected: SERVER_SECRET_MIN_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Parses a hex-encoded secret.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_bytes(hex::decode(hex_str.trim())?)
    }

    /// Generates a fresh random secret of the minimum size.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SERVER_SECRET_MIN_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Raw bytes, for keyed hashing.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex encoding, for provisioning. Never log the result.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerSecret(<{} bytes redacted>)", self.bytes.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORT KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// AES-256 key sealing identity mappings. Held by the support side.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SupportKey {
    bytes: [u8; SUPPORT_KEY_SIZE],
}

impl SupportKey {
    /// Wraps exactly 32 key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SUPPORT_KEY_SIZE] =
            bytes.try_into().map_err(|_| SwapError::InvalidKeySize {
                expected: SUPPORT_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    /// Parses a hex-encoded key.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let mut decoded = hex::decode(hex_str.trim())?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// Generates a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SUPPORT_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; SUPPORT_KEY_SIZE] {
        &self.bytes
    }

    /// Hex encoding, for provisioning. Never log the result.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for SupportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SupportKey(<redacted>)")
    }
}

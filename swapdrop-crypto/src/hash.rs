//! Hashing utilities with domain separation.
//!
//! Every SHAKE256 invocation in Swapdrop is prefixed by a unique domain
//! separator, and keyed invocations additionally absorb the server secret:
//!
//! ```text
//! output = SHAKE256(len(domain) || domain || len(key) || key || len(x1) || x1 || ..., n)
//! ```
//!
//! Length prefixes make the encoding injective, so `("ab", "c")` and
//! `("a", "bc")` never hash alike.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SHAKE256 FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn domain_hasher(domain: &[u8]) -> Shake256 {
    let mut hasher = Shake256::default();
    hasher.update(&(domain.len() as u32).to_le_bytes());
    hasher.update(domain);
    hasher
}

fn squeeze(hasher: Shake256, output_len: usize) -> Vec<u8> {
    let mut reader = hasher.finalize_xof();
    let mut output = vec![0u8; output_len];
    reader.read(&mut output);
    output
}

/// Computes SHAKE256 with domain separation.
///
/// # Example
///
/// ```rust,ignore
/// use swapdrop_crypto::shake256;
///
/// let digest = shake256(b"MY_DOMAIN", b"input", 32);
/// assert_eq!(digest.len(), 32);
/// ```
pub fn shake256(domain: &[u8], input: &[u8], output_len: usize) -> Vec<u8> {
    let mut hasher = domain_hasher(domain);
    hasher.update(input);
    squeeze(hasher, output_len)
}

/// Computes SHAKE256 over several length-prefixed inputs.
pub fn shake256_multi(domain: &[u8], inputs: &[&[u8]], output_len: usize) -> Vec<u8> {
    let mut hasher = domain_hasher(domain);
    for input in inputs {
        hasher.update(&(input.len() as u64).to_le_bytes());
        hasher.update(input);
    }
    squeeze(hasher, output_len)
}

/// Keyed SHAKE256: the key is absorbed, length-prefixed, right after the domain.
///
/// Used as a PRF: without `key`, outputs are unpredictable even for known inputs.
pub fn keyed_shake256(domain: &[u8], key: &[u8], inputs: &[&[u8]], output_len: usize) -> Vec<u8> {
    let mut hasher = domain_hasher(domain);
    hasher.update(&(key.len() as u64).to_le_bytes());
    hasher.update(key);
    for input in inputs {
        hasher.update(&(input.len() as u64).to_le_bytes());
        hasher.update(input);
    }
    squeeze(hasher, output_len)
}

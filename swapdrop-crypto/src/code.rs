//! Pseudonym and withdrawal-code derivation.
//!
//! ## Pseudonyms
//!
//! ```text
//! pseudonym = "SWP-" || encode(KSHAKE256(DOMAIN_PSEUDONYM, secret; party_id, exchange_id))
//! ```
//!
//! Deterministic per (party, exchange): repeated anonymization of the same
//! party in the same exchange yields the same token. Across exchanges the
//! tokens are unlinkable without the secret.
//!
//! ## Withdrawal codes
//!
//! ```text
//! code = "WD-" || encode(KSHAKE256(DOMAIN_WITHDRAWAL_CODE, secret;
//!                                  exchange_id, holder, leg_id, nonce))
//! ```
//!
//! The random issuance nonce makes every issued code unpredictable even for
//! someone who knows the other inputs.

use subtle::ConstantTimeEq;

use swapdrop_core::constants::{
    CODE_ALPHABET, DOMAIN_PSEUDONYM, DOMAIN_WITHDRAWAL_CODE, PSEUDONYM_LENGTH, PSEUDONYM_PREFIX,
    WITHDRAWAL_CODE_LENGTH, WITHDRAWAL_CODE_PREFIX,
};

use crate::hash::keyed_shake256;
use crate::secret::ServerSecret;

/// Encodes `len` alphabet characters from hash output.
///
/// The alphabet has 32 symbols, so the low five bits of each byte select a
/// character without modulo bias.
pub fn encode_code(bytes: &[u8], len: usize) -> String {
    bytes
        .iter()
        .take(len)
        .map(|b| CODE_ALPHABET[(b & 0x1f) as usize] as char)
        .collect()
}

/// Derives the pseudonym of `party_id` within `exchange_id`.
pub fn derive_pseudonym(secret: &ServerSecret, party_id: &str, exchange_id: &str) -> String {
    let digest = keyed_shake256(
        DOMAIN_PSEUDONYM,
        secret.as_bytes(),
        &[party_id.as_bytes(), exchange_id.as_bytes()],
        PSEUDONYM_LENGTH,
    );
    format!("{}{}", PSEUDONYM_PREFIX, encode_code(&digest, PSEUDONYM_LENGTH))
}

/// Derives a withdrawal code bound to one leg and its holder.
pub fn derive_withdrawal_code(
    secret: &ServerSecret,
    exchange_id: &str,
    holder: &str,
    leg_id: &str,
    nonce: &[u8],
) -> String {
    let digest = keyed_shake256(
        DOMAIN_WITHDRAWAL_CODE,
        secret.as_bytes(),
        &[exchange_id.as_bytes(), holder.as_bytes(), leg_id.as_bytes(), nonce],
        WITHDRAWAL_CODE_LENGTH,
    );
    format!("{}{}", WITHDRAWAL_CODE_PREFIX, encode_code(&digest, WITHDRAWAL_CODE_LENGTH))
}

/// Constant-time code comparison.
///
/// Length mismatches return false without comparing contents.
pub fn codes_match(expected: &str, presented: &str) -> bool {
    let expected = expected.as_bytes();
    let presented = presented.as_bytes();
    expected.len() == presented.len() && bool::from(expected.ct_eq(presented))
}

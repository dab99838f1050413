//! Anonymized identities and sealed identity mappings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PSEUDONYM_LENGTH, PSEUDONYM_PREFIX};
use crate::error::{Result, SwapError};
use crate::types::{ExchangeId, PartyId, PickupPoint, PostalAddress, RealParty};

/// Pseudonym token shown instead of a real name, e.g. `SWP-7KQ2M9XAPD`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pseudonym(String);

impl Pseudonym {
    /// Wraps a formatted pseudonym, checking prefix and length.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().to_uppercase();
        let valid = s
            .strip_prefix(PSEUDONYM_PREFIX)
            .map(|rest| rest.len() == PSEUDONYM_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(false);
        if !valid {
            return Err(SwapError::ValidationError(format!("malformed pseudonym: {}", s)));
        }
        Ok(Self(s))
    }

    /// Wraps a pseudonym produced by the derivation function.
    pub fn from_formatted(s: String) -> Self {
        Self(s)
    }

    /// Returns the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The contact block printed on shipping documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    /// Name line (an operator name or a pseudonym)
    pub name: String,
    /// Optional: "care of" line
    pub care_of: Option<String>,
    /// Phone channel (relay number or masked)
    pub phone: Option<String>,
    /// Email channel (relay mailbox or masked)
    pub email: Option<String>,
    /// Mailing address
    pub address: PostalAddress,
}

impl ContactCard {
    /// Validates that a carrier can print this card.
    pub fn validate(&self, context: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SwapError::MissingField(format!("{}.name", context)));
        }
        self.address.validate(&format!("{}.address", context))
    }

    /// The same card readdressed to `point`, held there for the card's name.
    ///
    /// Printed labels use this form, so the recipient's own street never
    /// travels with the parcel.
    pub fn at_pickup_point(&self, point: &PickupPoint) -> Self {
        Self {
            name: self.name.clone(),
            care_of: Some(point.name.clone()),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: point.address.clone(),
        }
    }
}

/// Plaintext of a sealed mapping. Only the support side ever sees this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Exchange the pseudonym belongs to
    pub exchange_id: ExchangeId,
    /// The pseudonym this record resolves
    pub pseudonym: Pseudonym,
    /// Real identity as passed to the anonymizer
    pub real: RealParty,
    /// When the mapping was sealed
    pub sealed_at: DateTime<Utc>,
}

/// Authenticated ciphertext resolving a pseudonym back to a real identity.
///
/// # Layout
/// ```text
/// sealed = nonce (12) || AES-256-GCM(ciphertext || tag)
/// aad    = SHAKE256(DOMAIN_MAPPING_AAD, version || exchange_id || pseudonym)
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMapping {
    /// Format version
    pub version: u8,
    /// Exchange bound into the associated data
    pub exchange_id: ExchangeId,
    /// Pseudonym bound into the associated data
    pub pseudonym: Pseudonym,
    /// Nonce-prefixed ciphertext
    #[serde(with = "hex")]
    pub sealed: Vec<u8>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Set once the exchange closes: purge after this instant
    pub expires_at: Option<DateTime<Utc>>,
}

impl EncryptedMapping {
    /// Returns true if the retention window has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

impl fmt::Debug for EncryptedMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedMapping")
            .field("version", &self.version)
            .field("pseudonym", &self.pseudonym)
            .field("sealed_len", &self.sealed.len())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A party's pseudonymous presence within one exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizedIdentity {
    /// Exchange this identity is scoped to
    pub exchange_id: ExchangeId,
    /// Real party (internal reference, never printed)
    pub party_id: PartyId,
    /// Deterministic pseudonym for (exchange, party)
    pub pseudonym: Pseudonym,
    /// Card printed when this party sends: operator relay address, pseudonym as care-of
    pub as_sender: ContactCard,
    /// Card printed when this party receives: real address, pseudonym name, relayed channels
    pub as_recipient: ContactCard,
    /// Sealed mapping; `None` once purged after retention
    pub mapping: Option<EncryptedMapping>,
}

//! Withdrawal credentials.
//!
//! A credential's code, leg and holder are fixed at issuance. Only the
//! consumption record changes, and only once.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::types::{LegId, PartyId};

/// A human-copyable withdrawal code, e.g. `WD-K7Q2M9XA`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalCode(String);

impl WithdrawalCode {
    /// Wraps an already-formatted code.
    pub fn from_formatted(code: String) -> Self {
        Self(code)
    }

    /// Returns the code as printed for the holder.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalizes a code typed by a person: trimmed and upper-cased.
    pub fn normalize_presented(presented: &str) -> String {
        presented.trim().to_uppercase()
    }
}

// Codes release parcels; keep them out of logs.
impl fmt::Debug for WithdrawalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WithdrawalCode(<redacted>)")
    }
}

/// Single-use code bound to one leg and one intended holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalCredential {
    leg_id: LegId,
    holder: PartyId,
    code: WithdrawalCode,
    #[serde(with = "hex")]
    issuance_nonce: Vec<u8>,
    issued_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    consumed_by: Option<PartyId>,
}

impl WithdrawalCredential {
    /// Creates an unconsumed credential.
    pub fn new(
        leg_id: LegId,
        holder: PartyId,
        code: WithdrawalCode,
        issuance_nonce: Vec<u8>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            leg_id,
            holder,
            code,
            issuance_nonce,
            issued_at,
            consumed_at: None,
            consumed_by: None,
        }
    }

    /// Leg this credential releases.
    pub fn leg_id(&self) -> LegId {
        self.leg_id
    }

    /// Party entitled to collect the parcel.
    pub fn holder(&self) -> &PartyId {
        &self.holder
    }

    /// The code itself.
    pub fn code(&self) -> &WithdrawalCode {
        &self.code
    }

    /// Random nonce mixed into the code at issuance.
    pub fn issuance_nonce(&self) -> &[u8] {
        &self.issuance_nonce
    }

    /// Issuance time.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns true once the credential has been used.
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// When the credential was used.
    pub fn consumed_at(&self) -> Option<DateTime<Utc>> {
        self.consumed_at
    }

    /// Who used the credential.
    pub fn consumed_by(&self) -> Option<&PartyId> {
        self.consumed_by.as_ref()
    }

    /// Marks the credential consumed.
    ///
    /// # Errors
    /// Fails if the credential was already consumed.
    pub fn consume(&mut self, by: PartyId, at: DateTime<Utc>) -> Result<()> {
        if self.is_consumed() {
            return Err(SwapError::CredentialMismatch);
        }
        self.consumed_at = Some(at);
        self.consumed_by = Some(by);
        Ok(())
    }
}

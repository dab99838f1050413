//! Disputes: loss or mismatch reports that freeze an exchange.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DisputeId, LegId, OperatorId, PartyId};

/// Who raised a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reporter {
    /// One of the exchange parties
    Party(PartyId),
    /// The carrier, through tracking sync
    Carrier,
}

impl fmt::Display for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reporter::Party(id) => write!(f, "party:{}", id),
            Reporter::Carrier => f.write_str("carrier"),
        }
    }
}

/// Why a dispute was opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeReason {
    /// A parcel was reported lost
    ParcelLost {
        /// The lost leg
        leg_id: LegId,
    },
    /// The received item is not the one agreed
    ItemMismatch,
    /// The received item arrived damaged
    ItemDamaged,
    /// Anything else, described by the reporter
    Other(String),
}

/// Support decision closing a dispute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisputeOutcome {
    /// Unfreeze; legs continue where they are
    ReleaseGoods,
    /// Unfreeze and record that a party is compensated off-engine
    Compensate,
    /// Cancel every leg that is not yet terminal
    CancelExchange,
}

/// Support's resolution record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    /// Decision
    pub outcome: DisputeOutcome,
    /// Operator who decided
    pub operator: OperatorId,
    /// Decision time
    pub resolved_at: DateTime<Utc>,
}

/// A dispute on an exchange. Open while `resolution` is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Identifier
    pub id: DisputeId,
    /// Who opened it
    pub reporter: Reporter,
    /// Category
    pub reason: DisputeReason,
    /// Reporter-supplied evidence (photos reference, carrier claim id, ...)
    pub evidence: String,
    /// Opening time
    pub opened_at: DateTime<Utc>,
    /// Set once resolved
    pub resolution: Option<DisputeResolution>,
}

impl Dispute {
    /// Creates an open dispute.
    pub fn open(reporter: Reporter, reason: DisputeReason, evidence: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: DisputeId::generate(),
            reporter,
            reason,
            evidence: evidence.into(),
            opened_at: at,
            resolution: None,
        }
    }

    /// Returns true until resolved.
    pub fn is_open(&self) -> bool {
        self.resolution.is_none()
    }
}

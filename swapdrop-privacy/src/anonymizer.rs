//! Identity anonymization.
//!
//! A party appears on shipping documents in two roles:
//!
//! - **as sender**: the operator's relay address replaces the party's address
//!   entirely, and the pseudonym is printed on the "care of" line
//! - **as recipient**: the real street address is kept so the carrier can
//!   deliver, but the name becomes the pseudonym and the phone/email become
//!   relay channels (or partial masks when no relay channel is configured)
//!
//! The real identity is sealed into an [`EncryptedMapping`] only support can open.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::types::{
    AnonymizedIdentity, ContactCard, ExchangeId, MappingRecord, PostalAddress, Pseudonym, RealParty,
};
use swapdrop_crypto::{derive_pseudonym, MappingSealer, ServerSecret};

use crate::mask::mask_contact;

/// Operator-owned relay identity printed in place of real sender details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Name line on sender cards
    pub name: String,
    /// Relay mailing address
    pub address: PostalAddress,
    /// Optional: relay phone number shared by all parties
    pub phone: Option<String>,
    /// Optional: mail domain for per-pseudonym relay mailboxes
    pub email_domain: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "Swapdrop Relay".into(),
            address: PostalAddress::new("1 Relay Way", "Paris", "75001", "FR"),
            phone: None,
            email_domain: Some("relay.swapdrop.example".into()),
        }
    }
}

impl RelayConfig {
    /// Validates that the relay card is printable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SwapError::MissingField("relay.name".into()));
        }
        self.address.validate("relay.address")
    }

    fn mailbox(&self, pseudonym: &Pseudonym) -> Option<String> {
        self.email_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|domain| format!("{}@{}", pseudonym.as_str().to_lowercase(), domain))
    }
}

/// Turns real identities into per-exchange pseudonymous identities.
#[derive(Clone, Debug)]
pub struct IdentityAnonymizer {
    secret: Arc<ServerSecret>,
    sealer: Option<MappingSealer>,
    relay: RelayConfig,
}

impl IdentityAnonymizer {
    /// Creates an anonymizer.
    ///
    /// Without a `sealer` every [`anonymize`](Self::anonymize) call fails
    /// with `EncryptionUnavailable`.
    pub fn new(secret: Arc<ServerSecret>, sealer: Option<MappingSealer>, relay: RelayConfig) -> Self {
        Self { secret, sealer, relay }
    }

    /// Relay settings.
    pub fn relay(&self) -> &RelayConfig {
        &self.relay
    }

    /// Deterministic pseudonym of `party_id` within `exchange_id`.
    pub fn pseudonym(&self, exchange_id: &ExchangeId, party_id: &str) -> Pseudonym {
        Pseudonym::from_formatted(derive_pseudonym(&self.secret, party_id, exchange_id.as_str()))
    }

    /// Anonymizes `real` for use within `exchange_id`.
    ///
    /// # Errors
    /// - `EncryptionUnavailable` if no support key is configured
    /// - `MissingField` / `ValidationError` if the party or a produced card is incomplete
    #[instrument(skip_all, fields(exchange_id = %exchange_id, party_id = %real.id))]
    pub fn anonymize(
        &self,
        exchange_id: &ExchangeId,
        real: &RealParty,
        now: DateTime<Utc>,
    ) -> Result<AnonymizedIdentity> {
        let sealer = self.sealer.as_ref().ok_or_else(|| {
            SwapError::EncryptionUnavailable("no support key configured".into())
        })?;
        real.validate("party")?;

        let pseudonym = self.pseudonym(exchange_id, real.id.as_str());

        let as_sender = ContactCard {
            name: self.relay.name.clone(),
            care_of: Some(pseudonym.to_string()),
            phone: self.relay.phone.clone(),
            email: self.relay.mailbox(&pseudonym),
            address: self.relay.address.clone(),
        };
        let as_recipient = ContactCard {
            name: pseudonym.to_string(),
            care_of: None,
            phone: self
                .relay
                .phone
                .clone()
                .or_else(|| real.phone.as_deref().map(mask_contact)),
            email: self
                .relay
                .mailbox(&pseudonym)
                .or_else(|| real.email.as_deref().map(mask_contact)),
            address: real.address.clone(),
        };
        as_sender.validate("as_sender")?;
        as_recipient.validate("as_recipient")?;

        let record = MappingRecord {
            exchange_id: exchange_id.clone(),
            pseudonym: pseudonym.clone(),
            real: real.clone(),
            sealed_at: now,
        };
        let mapping = sealer.seal(&record, now)?;

        debug!(pseudonym = %pseudonym, "identity anonymized");

        Ok(AnonymizedIdentity {
            exchange_id: exchange_id.clone(),
            party_id: real.id.clone(),
            pseudonym,
            as_sender,
            as_recipient,
            mapping: Some(mapping),
        })
    }
}

//! Withdrawal credential issuance and validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;

use swapdrop_core::constants::ISSUANCE_NONCE_SIZE;
use swapdrop_core::types::{ExchangeId, LegId, PartyId, WithdrawalCode, WithdrawalCredential};
use swapdrop_crypto::{codes_match, derive_withdrawal_code, ServerSecret};

/// Issues and validates withdrawal credentials.
///
/// Stateless with respect to storage: the issued credential lives on its leg.
#[derive(Clone, Debug)]
pub struct CredentialIssuer {
    secret: Arc<ServerSecret>,
}

impl CredentialIssuer {
    /// Creates an issuer keyed by the server secret.
    pub fn new(secret: Arc<ServerSecret>) -> Self {
        Self { secret }
    }

    /// Issues a credential for `leg_id`, collectable only by `holder`.
    pub fn issue(
        &self,
        exchange_id: &ExchangeId,
        leg_id: LegId,
        holder: &PartyId,
        now: DateTime<Utc>,
    ) -> WithdrawalCredential {
        let mut nonce = vec![0u8; ISSUANCE_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let code = derive_withdrawal_code(
            &self.secret,
            exchange_id.as_str(),
            holder.as_str(),
            &leg_id.to_string(),
            &nonce,
        );
        WithdrawalCredential::new(leg_id, holder.clone(), WithdrawalCode::from_formatted(code), nonce, now)
    }

    /// Returns true if `presented` is the code of `credential` for `leg_id`.
    ///
    /// Case and surrounding whitespace are ignored. The comparison of the
    /// code itself is constant-time. Consumption is not checked here.
    pub fn validate(&self, credential: &WithdrawalCredential, leg_id: LegId, presented: &str) -> bool {
        let presented = WithdrawalCode::normalize_presented(presented);
        let matches = codes_match(credential.code().as_str(), &presented);
        matches && credential.leg_id() == leg_id
    }
}

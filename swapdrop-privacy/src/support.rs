//! Support-side decryption of identity mappings.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use swapdrop_core::error::Result;
use swapdrop_core::traits::{SupportAction, SupportAuthorizer};
use swapdrop_core::types::{EncryptedMapping, MappingRecord, OperatorId};
use swapdrop_crypto::MappingSealer;

/// Opens sealed mappings for authorized support operators.
#[derive(Clone)]
pub struct SupportDecryptor {
    sealer: MappingSealer,
    authorizer: Arc<dyn SupportAuthorizer>,
}

impl SupportDecryptor {
    /// Creates a decryptor gated by `authorizer`.
    pub fn new(sealer: MappingSealer, authorizer: Arc<dyn SupportAuthorizer>) -> Self {
        Self { sealer, authorizer }
    }

    /// Decrypts `mapping` if `operator` may reveal identities.
    ///
    /// # Errors
    /// `Unauthorized` before any decryption is attempted; `DecryptionFailed`
    /// if the mapping does not authenticate.
    pub fn reveal(&self, operator: &OperatorId, mapping: &EncryptedMapping) -> Result<MappingRecord> {
        if let Err(e) = self.authorizer.authorize(operator, SupportAction::RevealIdentities) {
            warn!(operator = %operator, "identity reveal refused");
            return Err(e);
        }
        let record = self.sealer.open(mapping)?;
        info!(
            operator = %operator,
            exchange_id = %mapping.exchange_id,
            pseudonym = %mapping.pseudonym,
            "identity mapping revealed"
        );
        Ok(record)
    }
}

impl fmt::Debug for SupportDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupportDecryptor").finish_non_exhaustive()
    }
}

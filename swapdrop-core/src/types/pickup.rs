//! Pickup points and directory candidates.

use serde::{Deserialize, Serialize};

use crate::types::PostalAddress;

/// A collection location where parcels wait for their recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPoint {
    /// Provider identifier
    pub id: String,
    /// Shop or locker name
    pub name: String,
    /// Street address of the point
    pub address: PostalAddress,
    /// Declared service area as normalized postal-code prefixes.
    /// An empty list serves nothing.
    pub service_area: Vec<String>,
}

impl PickupPoint {
    /// Returns true if the declared service area covers `postal_code`.
    ///
    /// `postal_code` must already be normalized (upper-case, no spaces).
    pub fn serves(&self, postal_code: &str) -> bool {
        self.service_area.iter().any(|prefix| {
            let prefix: String = prefix
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_uppercase)
                .collect();
            !prefix.is_empty() && postal_code.starts_with(&prefix)
        })
    }
}

/// A pickup point proposed by a provider, with its distance to the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickupCandidate {
    /// The proposed point
    pub point: PickupPoint,
    /// Estimated distance from the target address
    pub distance_km: f64,
}

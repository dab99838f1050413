//! Static pickup-point catalog.

use async_trait::async_trait;

use swapdrop_core::error::Result;
use swapdrop_core::traits::PickupPointProvider;
use swapdrop_core::types::{PickupCandidate, PickupPoint, PostalAddress};

/// Rough distance added per postal-code digit that differs.
const KM_PER_DIVERGENT_DIGIT: f64 = 3.0;

/// A fixed list of pickup points, e.g. loaded from a JSON file.
///
/// Distance is estimated from how much of the postal code two addresses
/// share, which is enough to rank points inside one delivery area. Points in
/// another country are never proposed.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    points: Vec<PickupPoint>,
}

impl StaticCatalog {
    /// Creates a catalog over `points`.
    pub fn new(points: Vec<PickupPoint>) -> Self {
        Self { points }
    }

    /// Parses a JSON array of pickup points.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Catalog entries.
    pub fn points(&self) -> &[PickupPoint] {
        &self.points
    }

    fn estimate_km(from: &PostalAddress, to: &PostalAddress) -> f64 {
        let a = from.normalized_postal_code();
        let b = to.normalized_postal_code();
        let shared = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
        let longest = a.chars().count().max(b.chars().count());
        (longest - shared) as f64 * KM_PER_DIVERGENT_DIGIT
    }
}

#[async_trait]
impl PickupPointProvider for StaticCatalog {
    async fn candidates(&self, target: &PostalAddress, _radius_km: u32) -> Result<Vec<PickupCandidate>> {
        let country = target.country.trim().to_uppercase();
        Ok(self
            .points
            .iter()
            .filter(|p| p.address.country.trim().to_uppercase() == country)
            .map(|p| PickupCandidate {
                distance_km: Self::estimate_km(target, &p.address),
                point: p.clone(),
            })
            .collect())
    }
}

//! Pickup-point directory.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use swapdrop_core::constants::DEFAULT_PICKUP_RADIUS_KM;
use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::PickupPointProvider;
use swapdrop_core::types::{PickupCandidate, PickupPoint, PostalAddress};

use crate::cache::{CacheConfig, PickupCache};

/// Directory configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Search radius around the target address
    pub radius_km: u32,
    /// Resolution cache settings
    pub cache: CacheConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_PICKUP_RADIUS_KM,
            cache: CacheConfig::default(),
        }
    }
}

/// Resolves destination addresses to pickup points.
///
/// Read-only: owns no delivery state. Among the candidates a provider
/// returns, only points within the radius whose service area covers the
/// target postal code qualify; the nearest wins, ties broken by point ID.
pub struct PickupPointDirectory {
    provider: Arc<dyn PickupPointProvider>,
    cache: PickupCache,
    config: DirectoryConfig,
}

impl PickupPointDirectory {
    /// Creates a directory over `provider`.
    pub fn new(provider: Arc<dyn PickupPointProvider>, config: DirectoryConfig) -> Self {
        Self {
            provider,
            cache: PickupCache::with_config(config.cache.clone()),
            config,
        }
    }

    /// Directory settings.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Resolution cache, for inspection.
    pub fn cache(&self) -> &PickupCache {
        &self.cache
    }

    /// Resolves the pickup point serving `target`.
    ///
    /// # Errors
    /// - `MissingField` / `ValidationError` for an incomplete address
    /// - `NoPickupPointAvailable` when no candidate qualifies
    #[instrument(skip_all, fields(postal_code = %target.normalized_postal_code()))]
    pub async fn resolve_nearest(&self, target: &PostalAddress) -> Result<PickupPoint> {
        target.validate("target")?;

        let key = target.normalized_key();
        if let Some(point) = self.cache.get(&key) {
            debug!(point_id = %point.id, "pickup point cache hit");
            return Ok(point);
        }

        let postal_code = target.normalized_postal_code();
        let candidates = self.provider.candidates(target, self.config.radius_km).await?;
        let total = candidates.len();

        let chosen = select_nearest(candidates, &postal_code, self.config.radius_km).ok_or(
            SwapError::NoPickupPointAvailable {
                postal_code: postal_code.clone(),
                radius_km: self.config.radius_km,
            },
        )?;

        debug!(point_id = %chosen.id, candidates = total, "pickup point resolved");
        self.cache.insert(key, chosen.clone());
        Ok(chosen)
    }
}

fn select_nearest(candidates: Vec<PickupCandidate>, postal_code: &str, radius_km: u32) -> Option<PickupPoint> {
    let radius = f64::from(radius_km);
    candidates
        .into_iter()
        .filter(|c| c.distance_km.is_finite() && c.distance_km >= 0.0 && c.distance_km <= radius)
        .filter(|c| c.point.serves(postal_code))
        .min_by(|a, b| match a.distance_km.total_cmp(&b.distance_km) {
            Ordering::Equal => a.point.id.cmp(&b.point.id),
            other => other,
        })
        .map(|c| c.point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;

    struct Fixed {
        candidates: Vec<PickupCandidate>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PickupPointProvider for Fixed {
        async fn candidates(&self, _target: &PostalAddress, _radius_km: u32) -> Result<Vec<PickupCandidate>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.candidates.clone())
        }
    }

    fn candidate(id: &str, area: &str, distance_km: f64) -> PickupCandidate {
        PickupCandidate {
            point: PickupPoint {
                id: id.into(),
                name: format!("Shop {}", id),
                address: PostalAddress::new("3 High St", "Paris", "75011", "FR"),
                service_area: vec![area.into()],
            },
            distance_km,
        }
    }

    fn directory(candidates: Vec<PickupCandidate>) -> (PickupPointDirectory, Arc<Fixed>) {
        let provider = Arc::new(Fixed {
            candidates,
            calls: AtomicUsize::new(0),
        });
        (PickupPointDirectory::new(provider.clone(), DirectoryConfig::default()), provider)
    }

    fn target() -> PostalAddress {
        PostalAddress::new("12 Rue Oberkampf", "Paris", "75011", "FR")
    }

    #[tokio::test]
    async fn test_picks_nearest_serving_point() {
        let (dir, _) = directory(vec![
            candidate("far", "75", 9.0),
            candidate("wrong-area", "69", 0.5),
            candidate("near", "750", 2.0),
            candidate("out-of-radius", "75", 40.0),
        ]);
        assert_eq!(dir.resolve_nearest(&target()).await.unwrap().id, "near");
    }

    #[tokio::test]
    async fn test_ties_broken_by_id() {
        let (dir, _) = directory(vec![candidate("pp-b", "75", 1.0), candidate("pp-a", "75", 1.0)]);
        assert_eq!(dir.resolve_nearest(&target()).await.unwrap().id, "pp-a");
    }

    #[tokio::test]
    async fn test_cached_within_window_for_normalized_address() {
        let (dir, provider) = directory(vec![candidate("pp-1", "75", 1.0)]);

        let first = dir.resolve_nearest(&target()).await.unwrap();
        let messy = PostalAddress::new("  12 rue  OBERKAMPF ", "paris", "750 11", "fr");
        let second = dir.resolve_nearest(&messy).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_point_available() {
        let (dir, _) = directory(vec![candidate("lyon", "69", 1.0)]);
        let err = dir.resolve_nearest(&target()).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::NoPickupPointAvailable { ref postal_code, radius_km: 15 } if postal_code == "75011"
        ));
        assert!(dir.cache().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_incomplete_target() {
        let (dir, provider) = directory(vec![candidate("pp-1", "75", 1.0)]);
        let mut address = target();
        address.city = String::new();

        assert!(matches!(
            dir.resolve_nearest(&address).await,
            Err(SwapError::MissingField(ref f)) if f == "target.city"
        ));
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_nan_distance_never_qualifies() {
        let chosen = select_nearest(vec![candidate("nan", "75", f64::NAN)], "75011", 15);
        assert!(chosen.is_none());
    }
}

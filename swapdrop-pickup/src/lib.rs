//! Pickup-point resolution for Swapdrop.
//!
//! [`PickupPointDirectory`] turns a destination address into one concrete
//! pickup point. Lookups are cached per normalized address for a configurable
//! window, so the same address keeps resolving to the same point.

mod cache;
mod catalog;
mod directory;

pub use cache::{CacheConfig, PickupCache};
pub use catalog::StaticCatalog;
pub use directory::{DirectoryConfig, PickupPointDirectory};

//! Domain types for Swapdrop.
//!
//! - [`Exchange`]: The logical two-item swap, owning exactly two legs
//! - [`DeliveryLeg`]: One one-way shipment through a pickup point
//! - [`WithdrawalCredential`]: Single-use code that releases a parcel
//! - [`AnonymizedIdentity`]: Pseudonymous contact cards plus a sealed mapping
//! - [`PickupPoint`]: A collection location with a declared service area
//! - [`Dispute`]: A loss or mismatch report that freezes an exchange

mod ids;
mod party;
mod status;
mod credential;
mod identity;
mod pickup;
mod shipping;
mod leg;
mod dispute;
mod exchange;

pub use ids::*;
pub use party::*;
pub use status::*;
pub use credential::*;
pub use identity::*;
pub use pickup::*;
pub use shipping::*;
pub use leg::*;
pub use dispute::*;
pub use exchange::*;

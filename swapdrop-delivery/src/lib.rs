//! # Swapdrop Delivery Engine
//!
//! Orchestrates the two delivery legs of a swap: one parcel from A to B and
//! one from B to A, each routed through a pickup point under pseudonymous
//! identities.
//!
//! This crate provides:
//!
//! - **Orchestration**: [`DeliveryOrchestrator`] creates deliveries and applies
//!   shipment, arrival, pickup and loss transitions under a per-exchange lock
//! - **Status**: aggregate exchange status and per-party next actions
//! - **Disputes**: [`DisputeHandler`] freezes, resolves and (for authorized
//!   operators) de-anonymizes exchanges
//! - **Collaborators**: simulated carrier, notifiers and a static authorizer
//! - **Configuration**: [`EngineConfig`] loaded from the environment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use swapdrop_delivery::{DeliveryOrchestrator, Engine, EngineConfig};
//!
//! let engine = Engine::from_config(EngineConfig::from_env()?, store, carrier, notifier, provider)?;
//! let plan = engine.orchestrator.create_delivery(request).await?;
//! engine.orchestrator.confirm_shipment(&plan.exchange_id, plan.leg_a.leg_id, &alice, "TRK-1").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod authorizer;
pub mod carrier;
mod commit;
pub mod config;
pub mod dispute;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod locks;
pub mod notify;
pub mod orchestrator;
pub mod status;

#[cfg(test)]
mod tests;

pub use authorizer::StaticAuthorizer;
pub use carrier::SimulatedCarrier;
pub use config::{EngineConfig, OrchestratorConfig};
pub use dispute::DisputeHandler;
pub use engine::Engine;
pub use error::{OpResult, Rejection};
pub use limiter::{LimiterConfig, PickupAttemptLimiter};
pub use locks::{ExchangeGuard, ExchangeLocks};
pub use notify::{LogNotifier, RecordingNotifier};
pub use orchestrator::{
    CollectInstructions, DeliveryInstructions, DeliveryOrchestrator, DeliveryPlan, NewExchange,
    ShipInstructions,
};
pub use status::{next_action, LegView, StatusView};

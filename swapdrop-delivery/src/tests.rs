//! End-to-end tests of the orchestrator and dispute handler over in-memory
//! collaborators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use test_case::test_case;

use swapdrop_core::error::SwapError;
use swapdrop_core::traits::ExchangeStore;
use swapdrop_core::types::{
    DisputeOutcome, DisputeReason, ExchangeId, ExchangeStatus, ItemId, LegStatus, NextAction,
    OperatorId, PartyId, PickupPoint, PostalAddress, RealParty, TrackingState,
};
use swapdrop_crypto::{ServerSecret, SupportKey};
use swapdrop_pickup::StaticCatalog;
use swapdrop_store::{FileExchangeStore, MemoryExchangeStore};

use crate::{
    DeliveryPlan, Engine, EngineConfig, LimiterConfig, NewExchange, RecordingNotifier,
    SimulatedCarrier,
};

// ═══════════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════════

struct Harness {
    engine: Engine,
    store: Arc<dyn ExchangeStore>,
    carrier: Arc<SimulatedCarrier>,
    notifier: Arc<RecordingNotifier>,
}

fn party(id: &str) -> PartyId {
    PartyId::new(id).unwrap()
}

fn operator() -> OperatorId {
    OperatorId::new("ops-1").unwrap()
}

fn exchange_id() -> ExchangeId {
    ExchangeId::new("ex-42").unwrap()
}

fn alice() -> RealParty {
    RealParty {
        id: party("alice"),
        full_name: "Alice Martin".into(),
        phone: Some("+33612345678".into()),
        email: Some("alice@example.org".into()),
        address: PostalAddress::new("12 Rue Oberkampf", "Paris", "75011", "FR"),
    }
}

fn bob() -> RealParty {
    RealParty {
        id: party("bob"),
        full_name: "Bob Durand".into(),
        phone: None,
        email: Some("bob@example.net".into()),
        address: PostalAddress::new("8 Rue de Marseille", "Lyon", "69007", "FR"),
    }
}

fn catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        PickupPoint {
            id: "pp-paris-11".into(),
            name: "Tabac Oberkampf".into(),
            address: PostalAddress::new("40 Rue Oberkampf", "Paris", "75011", "FR"),
            service_area: vec!["750".into()],
        },
        PickupPoint {
            id: "pp-lyon-7".into(),
            name: "Relais Guillotiere".into(),
            address: PostalAddress::new("2 Place Gabriel Peri", "Lyon", "69007", "FR"),
            service_area: vec!["690".into()],
        },
    ])
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::new(ServerSecret::generate(), Some(SupportKey::generate()));
    config.support_operators = vec![operator()];
    config
}

fn harness_with(config: EngineConfig, store: Arc<dyn ExchangeStore>) -> Harness {
    let carrier = Arc::new(SimulatedCarrier::default());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::from_config(
        &config,
        store.clone(),
        carrier.clone(),
        notifier.clone(),
        Arc::new(catalog()),
    )
    .unwrap();
    Harness {
        engine,
        store,
        carrier,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(config(), Arc::new(MemoryExchangeStore::new()))
}

fn request() -> NewExchange {
    NewExchange {
        exchange_id: exchange_id(),
        party_a: alice(),
        party_b: bob(),
        item_a: ItemId::new("book-1").unwrap(),
        item_b: ItemId::new("lamp-7").unwrap(),
    }
}

async fn created() -> (Harness, DeliveryPlan) {
    let h = harness();
    let plan = h.engine.orchestrator.create_delivery(request()).await.unwrap();
    (h, plan)
}

impl Harness {
    async fn status(&self) -> ExchangeStatus {
        self.engine
            .orchestrator
            .get_status(&exchange_id())
            .await
            .unwrap()
            .aggregate_status
    }

    async fn version(&self) -> u64 {
        self.engine.orchestrator.get_status(&exchange_id()).await.unwrap().version
    }

    async fn ship_both(&self, plan: &DeliveryPlan) {
        let o = &self.engine.orchestrator;
        o.confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
            .await
            .unwrap();
        o.confirm_shipment(&exchange_id(), plan.leg_b.leg_id, &party("bob"), "TRK-B")
            .await
            .unwrap();
    }

    async fn arrive_both(&self, plan: &DeliveryPlan) {
        self.ship_both(plan).await;
        let o = &self.engine.orchestrator;
        o.confirm_arrival(&exchange_id(), plan.leg_a.leg_id, "scan-a").await.unwrap();
        o.confirm_arrival(&exchange_id(), plan.leg_b.leg_id, "scan-b").await.unwrap();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_scenario_a_shipments_raise_aggregate() {
    let (h, plan) = created().await;
    let o = &h.engine.orchestrator;
    assert_eq!(plan.aggregate_status, ExchangeStatus::LabelsGenerated);
    assert_eq!(h.status().await, ExchangeStatus::LabelsGenerated);

    let state = o
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Shipped);
    assert_eq!(h.status().await, ExchangeStatus::PartialShipped);

    o.confirm_shipment(&exchange_id(), plan.leg_b.leg_id, &party("bob"), "TRK-B")
        .await
        .unwrap();
    assert_eq!(h.status().await, ExchangeStatus::BothShipped);
}

#[tokio::test]
async fn test_scenario_b_wrong_code_then_right_code() {
    let (h, plan) = created().await;
    h.arrive_both(&plan).await;
    let o = &h.engine.orchestrator;
    let code = plan.instructions_b.collect.withdrawal_code.clone();
    assert_eq!(plan.instructions_b.collect.leg_id, plan.leg_a.leg_id);

    let rejection = o
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "WD-AAAAAAAA", true)
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::CredentialMismatch));
    assert_eq!(rejection.aggregate_status, Some(ExchangeStatus::BothArrived));

    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(view.leg_a.status, LegStatus::Arrived);

    let state = o
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &code, true)
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Delivered);
    assert_eq!(h.status().await, ExchangeStatus::PartialDelivered);
}

#[tokio::test]
async fn test_scenario_c_loss_overrides_other_leg() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    let o = &h.engine.orchestrator;

    let state = o
        .report_loss(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "never arrived")
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Lost);

    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(view.aggregate_status, ExchangeStatus::PartialLost);
    assert_eq!(view.leg_b.status, LegStatus::Shipped);
    assert!(view.open_dispute.is_some());
    assert_eq!(view.next_action_a, NextAction::None);
    assert_eq!(view.next_action_b, NextAction::None);
}

#[tokio::test]
async fn test_scenario_d_dispute_freezes_until_resolved() {
    let (h, plan) = created().await;
    let o = &h.engine.orchestrator;
    let dispute_id = h
        .engine
        .disputes
        .open_dispute(&exchange_id(), &party("bob"), DisputeReason::ItemMismatch, "listing photo differs")
        .await
        .unwrap();

    let frozen = o
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap_err();
    assert!(matches!(frozen.error, SwapError::ExchangeFrozen { .. }));
    assert_eq!(frozen.aggregate_status, Some(ExchangeStatus::LabelsGenerated));

    let arrival = o.confirm_arrival(&exchange_id(), plan.leg_b.leg_id, "scan").await.unwrap_err();
    assert!(matches!(arrival.error, SwapError::ExchangeFrozen { .. }));
    let loss = o
        .report_loss(&exchange_id(), plan.leg_b.leg_id, &party("alice"), "gone")
        .await
        .unwrap_err();
    assert!(matches!(loss.error, SwapError::ExchangeFrozen { .. }));

    let view = h
        .engine
        .disputes
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::ReleaseGoods)
        .await
        .unwrap();
    assert!(view.open_dispute.is_none());

    o.confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CREATION
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_routes_legs_to_recipients() {
    let (h, plan) = created().await;

    assert_eq!(plan.instructions_a.ship.label.pickup_point_id, "pp-lyon-7");
    assert_eq!(plan.instructions_a.collect.pickup_point.id, "pp-paris-11");
    assert_eq!(plan.instructions_b.collect.pickup_point.id, "pp-lyon-7");
    assert_ne!(
        plan.instructions_a.collect.withdrawal_code,
        plan.instructions_b.collect.withdrawal_code
    );
    assert_eq!(h.carrier.labels().len(), 2);
    assert_eq!(plan.leg_a.status, LegStatus::LabelGenerated);
    assert_eq!(h.version().await, 1);

    let kinds = h.notifier.kinds_for(&party("alice"));
    assert_eq!(kinds, vec!["delivery_created"]);
}

#[tokio::test]
async fn test_labels_carry_no_real_party_data() {
    let (h, plan) = created().await;
    let label = &plan.instructions_a.ship.label;

    assert_eq!(label.from.name, "Swapdrop Relay");
    assert_eq!(label.from.care_of.as_deref(), Some(plan.instructions_a.pseudonym.as_str()));
    assert_eq!(label.to.name, plan.instructions_b.pseudonym.as_str());
    assert_eq!(label.to.address, plan.instructions_b.collect.pickup_point.address);
    assert_eq!(label.to.care_of.as_deref(), Some("Relais Guillotiere"));

    let real_data = [
        "Alice Martin",
        "12 Rue Oberkampf",
        "alice@example.org",
        "+33612345678",
        "Bob Durand",
        "8 Rue de Marseille",
        "bob@example.net",
    ];
    let labels = h.carrier.labels();
    assert_eq!(labels.len(), 2);
    for printed in labels.iter().map(|l| serde_json::to_string(l).unwrap()) {
        for real in real_data {
            assert!(!printed.contains(real), "label leaked {}", real);
        }
    }
}

#[tokio::test]
async fn test_pseudonyms_deterministic_per_exchange() {
    let (h, plan) = created().await;
    let anonymizer = h.engine.orchestrator.anonymizer();

    let again = anonymizer.pseudonym(&exchange_id(), "alice");
    assert_eq!(again, plan.instructions_a.pseudonym);

    let elsewhere = anonymizer.pseudonym(&ExchangeId::new("ex-43").unwrap(), "alice");
    assert_ne!(elsewhere, plan.instructions_a.pseudonym);
    assert_ne!(plan.instructions_a.pseudonym, plan.instructions_b.pseudonym);
}

#[tokio::test]
async fn test_duplicate_create_reports_status() {
    let (h, _) = created().await;
    let rejection = h.engine.orchestrator.create_delivery(request()).await.unwrap_err();

    assert!(matches!(rejection.error, SwapError::DuplicateExchange(_)));
    assert_eq!(rejection.aggregate_status, Some(ExchangeStatus::LabelsGenerated));
}

#[tokio::test]
async fn test_create_without_support_key_fails_closed() {
    let mut config = config();
    config.support_key = None;
    let h = harness_with(config, Arc::new(MemoryExchangeStore::new()));

    let rejection = h.engine.orchestrator.create_delivery(request()).await.unwrap_err();
    assert!(matches!(rejection.error, SwapError::EncryptionUnavailable(_)));
    assert!(h.store.list_exchanges().await.unwrap().is_empty());
    assert!(h.carrier.labels().is_empty());
}

#[tokio::test]
async fn test_create_without_pickup_point_stores_nothing() {
    let h = harness();
    let mut request = request();
    request.party_b.address = PostalAddress::new("1 Quai du Port", "Marseille", "13002", "FR");

    let rejection = h.engine.orchestrator.create_delivery(request).await.unwrap_err();
    assert!(matches!(rejection.error, SwapError::NoPickupPointAvailable { .. }));
    assert!(h.store.list_exchanges().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_incomplete_address() {
    let h = harness();
    let mut request = request();
    request.party_a.address.city = " ".into();

    let rejection = h.engine.orchestrator.create_delivery(request).await.unwrap_err();
    assert!(matches!(rejection.error, SwapError::MissingField(ref f) if f == "party_a.address.city"));
    assert!(rejection.aggregate_status.is_none());
}

#[tokio::test]
async fn test_create_fails_when_carrier_down() {
    let h = harness();
    h.carrier.set_unavailable(true);

    let rejection = h.engine.orchestrator.create_delivery(request()).await.unwrap_err();
    assert!(matches!(rejection.error, SwapError::CarrierError(_)));
    assert!(h.store.list_exchanges().await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHIPMENT
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_repeated_shipment_is_noop() {
    let (h, plan) = created().await;
    let o = &h.engine.orchestrator;
    o.confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap();
    let version = h.version().await;

    let state = o
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), " TRK-A ")
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Shipped);
    assert_eq!(h.version().await, version);
    assert_eq!(h.notifier.kinds_for(&party("bob")), vec!["delivery_created", "leg_shipped"]);

    let conflict = o
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-Z")
        .await
        .unwrap_err();
    assert!(matches!(conflict.error, SwapError::TrackingConflict { .. }));
    assert_eq!(conflict.aggregate_status, Some(ExchangeStatus::PartialShipped));
}

#[tokio::test]
async fn test_only_sender_ships() {
    let (h, plan) = created().await;
    let rejection = h
        .engine
        .orchestrator
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "TRK-A")
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::InvalidTransition { .. }));
    assert_eq!(h.version().await, 1);
}

#[tokio::test]
async fn test_blank_tracking_ref_rejected() {
    let (h, plan) = created().await;
    let rejection = h
        .engine
        .orchestrator
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "  ")
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::MissingField(ref f) if f == "tracking_ref"));
}

#[tokio::test]
async fn test_arrival_requires_shipment() {
    let (h, plan) = created().await;
    let rejection = h
        .engine
        .orchestrator
        .confirm_arrival(&exchange_id(), plan.leg_a.leg_id, "scan")
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::InvalidTransition { .. }));
    assert_eq!(rejection.aggregate_status, Some(ExchangeStatus::LabelsGenerated));
}

#[tokio::test]
async fn test_unknown_exchange_and_leg() {
    let (h, _) = created().await;
    let o = &h.engine.orchestrator;

    let missing = o.get_status(&ExchangeId::new("nope").unwrap()).await.unwrap_err();
    assert!(matches!(missing.error, SwapError::ExchangeNotFound(_)));

    let leg = o
        .confirm_arrival(&exchange_id(), swapdrop_core::types::LegId::generate(), "scan")
        .await
        .unwrap_err();
    assert!(matches!(leg.error, SwapError::LegNotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════════
// PICKUP
// ═══════════════════════════════════════════════════════════════════════════════

#[test_case(false, true, "bob", true ; "leg not arrived")]
#[test_case(true, false, "bob", true ; "wrong code")]
#[test_case(true, true, "bob", false ; "identity not verified")]
#[test_case(true, true, "alice", true ; "wrong actor")]
#[tokio::test]
async fn test_failed_pickup_changes_nothing(arrived: bool, right_code: bool, actor: &str, verified: bool) {
    let (h, plan) = created().await;
    if arrived {
        h.arrive_both(&plan).await;
    } else {
        h.ship_both(&plan).await;
    }
    let before = h.store.load_exchange(&exchange_id()).await.unwrap().unwrap();

    let code = if right_code {
        plan.instructions_b.collect.withdrawal_code.clone()
    } else {
        "WD-WRONGWRG".to_string()
    };
    let rejection = h
        .engine
        .orchestrator
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party(actor), &code, verified)
        .await
        .unwrap_err();
    assert_eq!(rejection.aggregate_status, Some(before.status()));

    let after = h.store.load_exchange(&exchange_id()).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert!(!after.leg_a.credential().is_consumed());
}

#[tokio::test]
async fn test_pickup_code_is_case_insensitive() {
    let (h, plan) = created().await;
    h.arrive_both(&plan).await;
    let code = plan.instructions_b.collect.withdrawal_code.to_lowercase();

    let state = h
        .engine
        .orchestrator
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &format!(" {} ", code), true)
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Delivered);

    let again = h
        .engine
        .orchestrator
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &code, true)
        .await
        .unwrap_err();
    assert!(matches!(again.error, SwapError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_code_of_other_leg_rejected() {
    let (h, plan) = created().await;
    h.arrive_both(&plan).await;

    let alices_code = plan.instructions_a.collect.withdrawal_code.clone();
    let rejection = h
        .engine
        .orchestrator
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &alices_code, true)
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::CredentialMismatch));
}

#[tokio::test]
async fn test_pickup_attempts_are_limited() {
    let mut config = config();
    config.orchestrator.limiter = LimiterConfig {
        attempts_per_window: 2,
        window_secs: 600,
    };
    let h = harness_with(config, Arc::new(MemoryExchangeStore::new()));
    let plan = h.engine.orchestrator.create_delivery(request()).await.unwrap();
    h.arrive_both(&plan).await;
    let o = &h.engine.orchestrator;

    for _ in 0..2 {
        let r = o
            .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "WD-GUESSGSS", true)
            .await
            .unwrap_err();
        assert!(matches!(r.error, SwapError::CredentialMismatch));
    }

    let code = plan.instructions_b.collect.withdrawal_code.clone();
    let limited = o
        .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &code, true)
        .await
        .unwrap_err();
    assert!(matches!(limited.error, SwapError::TooManyAttempts { retry_after_secs } if retry_after_secs > 0));
    assert_eq!(limited.aggregate_status, Some(ExchangeStatus::BothArrived));

    // The other leg has its own budget.
    let other = plan.instructions_a.collect.withdrawal_code.clone();
    o.confirm_pickup(&exchange_id(), plan.leg_b.leg_id, &party("alice"), &other, true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_purge_forgets_replenished_attempt_buckets() {
    let mut config = config();
    config.orchestrator.limiter = LimiterConfig {
        attempts_per_window: 1,
        window_secs: 1,
    };
    let h = harness_with(config, Arc::new(MemoryExchangeStore::new()));
    let plan = h.engine.orchestrator.create_delivery(request()).await.unwrap();
    h.arrive_both(&plan).await;
    let o = &h.engine.orchestrator;

    o.confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "WD-GUESSGSS", true)
        .await
        .unwrap_err();
    assert_eq!(o.limiter().len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    o.purge_expired_mappings(Utc::now()).await.unwrap();
    assert!(o.limiter().is_empty());
}

#[tokio::test]
async fn test_lock_table_empties_between_operations() {
    let (h, plan) = created().await;
    let o = &h.engine.orchestrator;
    assert!(o.locks().is_empty());

    h.arrive_both(&plan).await;
    o.get_status(&exchange_id()).await.unwrap();
    o.purge_expired_mappings(Utc::now()).await.unwrap();
    assert!(o.locks().is_empty());
}

#[tokio::test]
async fn test_both_pickups_complete_exchange() {
    let (h, plan) = created().await;
    h.arrive_both(&plan).await;
    let o = &h.engine.orchestrator;

    o.confirm_pickup(
        &exchange_id(),
        plan.leg_a.leg_id,
        &party("bob"),
        &plan.instructions_b.collect.withdrawal_code,
        true,
    )
    .await
    .unwrap();
    let partial = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(partial.next_action_b, NextAction::AwaitCounterpartPickup);
    assert_eq!(partial.next_action_a, NextAction::Pickup);

    o.confirm_pickup(
        &exchange_id(),
        plan.leg_b.leg_id,
        &party("alice"),
        &plan.instructions_a.collect.withdrawal_code,
        true,
    )
    .await
    .unwrap();

    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(view.aggregate_status, ExchangeStatus::Completed);
    assert!(view.completed_at.is_some());
    assert_eq!(view.next_action_a, NextAction::Rate);
    assert_eq!(view.next_action_b, NextAction::Rate);

    let kinds = h.notifier.kinds_for(&party("alice"));
    assert_eq!(kinds.last(), Some(&"exchange_completed"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_random_codes_never_release_parcel(suffix in "[A-Z2-9]{8}") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (h, plan) = created().await;
            h.arrive_both(&plan).await;
            let presented = format!("WD-{}", suffix);
            prop_assume!(presented != plan.instructions_b.collect.withdrawal_code);

            let result = h
                .engine
                .orchestrator
                .confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &presented, true)
                .await;
            prop_assert!(result.is_err());

            let after = h.store.load_exchange(&exchange_id()).await.unwrap().unwrap();
            prop_assert_eq!(after.leg_a.status(), LegStatus::Arrived);
            prop_assert!(!after.leg_a.credential().is_consumed());
            Ok(())
        })?;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NEXT ACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_next_actions_follow_progress() {
    let (h, plan) = created().await;
    let o = &h.engine.orchestrator;

    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!((view.next_action_a, view.next_action_b), (NextAction::Ship, NextAction::Ship));

    o.confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap();
    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(view.next_action_a, NextAction::AwaitCounterpartShip);
    assert_eq!(view.next_action_b, NextAction::Ship);

    o.confirm_shipment(&exchange_id(), plan.leg_b.leg_id, &party("bob"), "TRK-B")
        .await
        .unwrap();
    o.confirm_arrival(&exchange_id(), plan.leg_a.leg_id, "scan-a").await.unwrap();
    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(view.next_action_a, NextAction::None);
    assert_eq!(view.next_action_b, NextAction::Pickup);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CARRIER SYNC
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_sync_tracking_applies_carrier_state() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    let o = &h.engine.orchestrator;

    assert_eq!(o.sync_tracking(&exchange_id(), plan.leg_a.leg_id).await.unwrap(), LegStatus::Shipped);

    h.carrier.set_tracking("TRK-A", TrackingState::ReadyForPickup, "at Relais Guillotiere");
    assert_eq!(o.sync_tracking(&exchange_id(), plan.leg_a.leg_id).await.unwrap(), LegStatus::Arrived);
    assert_eq!(o.sync_tracking(&exchange_id(), plan.leg_a.leg_id).await.unwrap(), LegStatus::Arrived);

    h.carrier.set_tracking("TRK-B", TrackingState::Lost, "claim 77");
    assert_eq!(o.sync_tracking(&exchange_id(), plan.leg_b.leg_id).await.unwrap(), LegStatus::Lost);

    let exchange = h.store.load_exchange(&exchange_id()).await.unwrap().unwrap();
    assert_eq!(exchange.status(), ExchangeStatus::PartialLost);
    assert_eq!(exchange.open_dispute().map(|d| d.reporter.to_string()), Some("carrier".to_string()));
}

#[tokio::test]
async fn test_sync_tracking_reports_carrier_outage() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    h.carrier.set_unavailable(true);

    let rejection = h
        .engine
        .orchestrator
        .sync_tracking(&exchange_id(), plan.leg_a.leg_id)
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, SwapError::CarrierError(_)));
    assert_eq!(rejection.aggregate_status, Some(ExchangeStatus::BothShipped));
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_cancel_outcome_cancels_open_legs() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    h.engine
        .orchestrator
        .confirm_arrival(&exchange_id(), plan.leg_a.leg_id, "scan-a")
        .await
        .unwrap();
    h.engine
        .orchestrator
        .confirm_pickup(
            &exchange_id(),
            plan.leg_a.leg_id,
            &party("bob"),
            &plan.instructions_b.collect.withdrawal_code,
            true,
        )
        .await
        .unwrap();

    let d = &h.engine.disputes;
    let dispute_id = d
        .open_dispute(&exchange_id(), &party("bob"), DisputeReason::ItemDamaged, "photos 1-3")
        .await
        .unwrap();
    let view = d
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::CancelExchange)
        .await
        .unwrap();

    assert_eq!(view.leg_a.status, LegStatus::Delivered);
    assert_eq!(view.leg_b.status, LegStatus::Cancelled);
    assert_eq!(view.aggregate_status, ExchangeStatus::Cancelled);
}

#[tokio::test]
async fn test_compensate_outcome_unfreezes() {
    let (h, plan) = created().await;
    let d = &h.engine.disputes;
    let dispute_id = d
        .open_dispute(&exchange_id(), &party("alice"), DisputeReason::Other("no answer".into()), "chat log")
        .await
        .unwrap();

    let view = d
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::Compensate)
        .await
        .unwrap();
    assert!(view.compensated);
    assert!(view.open_dispute.is_none());

    h.engine
        .orchestrator
        .confirm_shipment(&exchange_id(), plan.leg_b.leg_id, &party("bob"), "TRK-B")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_surviving_leg_still_collectable_after_release() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    let o = &h.engine.orchestrator;
    o.confirm_arrival(&exchange_id(), plan.leg_b.leg_id, "scan-b").await.unwrap();
    o.report_loss(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "tracking dead for 3 weeks")
        .await
        .unwrap();

    let frozen = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!(frozen.next_action_a, NextAction::None);
    let dispute_id = frozen.open_dispute.unwrap();

    let view = h
        .engine
        .disputes
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::ReleaseGoods)
        .await
        .unwrap();
    assert_eq!(view.aggregate_status, ExchangeStatus::PartialLost);
    assert_eq!(view.next_action_a, NextAction::Pickup);
    assert_eq!(view.next_action_b, NextAction::None);

    let state = o
        .confirm_pickup(
            &exchange_id(),
            plan.leg_b.leg_id,
            &party("alice"),
            &plan.instructions_a.collect.withdrawal_code,
            true,
        )
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Delivered);

    let view = o.get_status(&exchange_id()).await.unwrap();
    assert_eq!((view.next_action_a, view.next_action_b), (NextAction::None, NextAction::None));
}

#[tokio::test]
async fn test_dispute_rules() {
    let (h, _) = created().await;
    let d = &h.engine.disputes;

    let outsider = d
        .open_dispute(&exchange_id(), &party("mallory"), DisputeReason::ItemMismatch, "x")
        .await
        .unwrap_err();
    assert!(matches!(outsider.error, SwapError::Unauthorized(_)));

    let dispute_id = d
        .open_dispute(&exchange_id(), &party("alice"), DisputeReason::ItemMismatch, "x")
        .await
        .unwrap();
    let second = d
        .open_dispute(&exchange_id(), &party("bob"), DisputeReason::ItemDamaged, "y")
        .await
        .unwrap_err();
    assert!(matches!(second.error, SwapError::DisputeAlreadyOpen(_)));

    let stranger = OperatorId::new("intern").unwrap();
    let denied = d
        .resolve_dispute(&exchange_id(), dispute_id, &stranger, DisputeOutcome::ReleaseGoods)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, SwapError::Unauthorized(_)));

    d.resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::ReleaseGoods)
        .await
        .unwrap();
    let twice = d
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::ReleaseGoods)
        .await
        .unwrap_err();
    assert!(matches!(twice.error, SwapError::DisputeNotOpen(_)));
}

#[tokio::test]
async fn test_both_lost_after_release() {
    let (h, plan) = created().await;
    h.ship_both(&plan).await;
    let o = &h.engine.orchestrator;

    o.report_loss(&exchange_id(), plan.leg_a.leg_id, &party("bob"), "claim 1")
        .await
        .unwrap();
    let dispute_id = o.get_status(&exchange_id()).await.unwrap().open_dispute.unwrap();
    h.engine
        .disputes
        .resolve_dispute(&exchange_id(), dispute_id, &operator(), DisputeOutcome::ReleaseGoods)
        .await
        .unwrap();

    o.report_loss(&exchange_id(), plan.leg_b.leg_id, &party("alice"), "claim 2")
        .await
        .unwrap();
    assert_eq!(h.status().await, ExchangeStatus::BothLost);
}

#[tokio::test]
async fn test_reveal_identities_round_trip() {
    let (h, _) = created().await;
    let d = &h.engine.disputes;

    let not_disputed = d.reveal_identities(&exchange_id(), &operator()).await.unwrap_err();
    assert!(matches!(not_disputed.error, SwapError::DisputeNotOpen(_)));

    d.open_dispute(&exchange_id(), &party("bob"), DisputeReason::ItemMismatch, "photo")
        .await
        .unwrap();

    let stranger = OperatorId::new("intern").unwrap();
    let denied = d.reveal_identities(&exchange_id(), &stranger).await.unwrap_err();
    assert!(matches!(denied.error, SwapError::Unauthorized(_)));

    let (a, b) = d.reveal_identities(&exchange_id(), &operator()).await.unwrap();
    assert_eq!(a.real, alice());
    assert_eq!(b.real, bob());
    assert_eq!(a.exchange_id, exchange_id());
}

// ═══════════════════════════════════════════════════════════════════════════════
// RETENTION, NOTIFICATIONS, CONCURRENCY, PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_mappings_purged_after_retention() {
    let (h, plan) = created().await;
    h.arrive_both(&plan).await;
    let o = &h.engine.orchestrator;
    o.confirm_pickup(&exchange_id(), plan.leg_a.leg_id, &party("bob"), &plan.instructions_b.collect.withdrawal_code, true)
        .await
        .unwrap();
    o.confirm_pickup(&exchange_id(), plan.leg_b.leg_id, &party("alice"), &plan.instructions_a.collect.withdrawal_code, true)
        .await
        .unwrap();

    assert_eq!(o.purge_expired_mappings(Utc::now()).await.unwrap(), 0);
    assert_eq!(o.purge_expired_mappings(Utc::now() + Duration::days(91)).await.unwrap(), 2);

    let exchange = h.store.load_exchange(&exchange_id()).await.unwrap().unwrap();
    assert!(exchange.identity_a.mapping.is_none());
    assert!(exchange.identity_b.mapping.is_none());
}

#[tokio::test]
async fn test_open_exchange_keeps_mappings() {
    let (h, _) = created().await;
    let purged = h
        .engine
        .orchestrator
        .purge_expired_mappings(Utc::now() + Duration::days(3650))
        .await
        .unwrap();
    assert_eq!(purged, 0);
}

#[tokio::test]
async fn test_notification_failure_keeps_transition() {
    let (h, plan) = created().await;
    h.notifier.set_failing(true);

    let state = h
        .engine
        .orchestrator
        .confirm_shipment(&exchange_id(), plan.leg_a.leg_id, &party("alice"), "TRK-A")
        .await
        .unwrap();
    assert_eq!(state, LegStatus::Shipped);
    assert_eq!(h.status().await, ExchangeStatus::PartialShipped);
}

#[tokio::test]
async fn test_parallel_shipments_on_both_legs() {
    let (h, plan) = created().await;
    let o = h.engine.orchestrator.clone();
    let id = exchange_id();
    let (alice, bob) = (party("alice"), party("bob"));

    let (a, b) = futures::join!(
        o.confirm_shipment(&id, plan.leg_a.leg_id, &alice, "TRK-A"),
        o.confirm_shipment(&id, plan.leg_b.leg_id, &bob, "TRK-B"),
    );
    a.unwrap();
    b.unwrap();

    let view = o.get_status(&id).await.unwrap();
    assert_eq!(view.aggregate_status, ExchangeStatus::BothShipped);
    assert_eq!(view.version, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_transitions_serialize() {
    let (h, plan) = created().await;
    let mut handles = Vec::new();
    for (leg_id, sender, tracking) in [
        (plan.leg_a.leg_id, "alice", "TRK-A"),
        (plan.leg_b.leg_id, "bob", "TRK-B"),
    ] {
        let o = h.engine.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            o.confirm_shipment(&exchange_id(), leg_id, &party(sender), tracking).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.status().await, ExchangeStatus::BothShipped);
    assert_eq!(h.version().await, 3);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exchanges.bin");
    let config = config();

    let plan = {
        let store = Arc::new(FileExchangeStore::open(&path).await.unwrap());
        let h = harness_with(config.clone(), store);
        let plan = h.engine.orchestrator.create_delivery(request()).await.unwrap();
        h.ship_both(&plan).await;
        plan
    };

    let store = Arc::new(FileExchangeStore::open(&path).await.unwrap());
    let h = harness_with(config, store);
    assert_eq!(h.status().await, ExchangeStatus::BothShipped);

    h.engine
        .orchestrator
        .confirm_arrival(&exchange_id(), plan.leg_a.leg_id, "scan-a")
        .await
        .unwrap();
    assert_eq!(h.status().await, ExchangeStatus::PartialArrived);
}

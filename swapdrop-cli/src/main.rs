//! Swapdrop CLI
//!
//! Command-line interface for the Swapdrop pickup-point delivery engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swapdrop_core::traits::ExchangeStore;
use swapdrop_core::types::{
    DisputeOutcome, ExchangeId, ExchangeStatus, ItemId, LegStatus, OperatorId, PartyId, PickupPoint, PostalAddress,
    RealParty, TrackingState,
};
use swapdrop_crypto::{ServerSecret, SupportKey};
use swapdrop_delivery::{
    DeliveryPlan, Engine, EngineConfig, LogNotifier, NewExchange, RecordingNotifier, SimulatedCarrier,
    StatusView,
};
use swapdrop_pickup::StaticCatalog;
use swapdrop_privacy::{IdentityAnonymizer, RelayConfig};
use swapdrop_store::{FileExchangeStore, MemoryExchangeStore};

/// Operator the simulation acts as when a dispute needs support.
const SIMULATION_OPERATOR: &str = "sim-operator";

/// Swapdrop - Anonymous two-way pickup-point delivery for item swaps
#[derive(Parser)]
#[command(name = "swapdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a server secret and a support key
    Keygen {
        /// Output file for keys (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the pseudonym a party carries inside an exchange
    Pseudonym {
        /// Marketplace party ID
        party: String,
        /// Marketplace exchange ID
        exchange: String,
        /// Server secret (hex)
        #[arg(long, env = "SWAPDROP_SERVER_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Run exchanges end to end against the simulated carrier
    Simulate {
        /// Exchange store file (in-memory if omitted)
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Pickup point catalog (JSON array); a built-in demo catalog if omitted
        #[arg(short, long)]
        catalog: Option<PathBuf>,
        /// Number of exchanges to run
        #[arg(short = 'n', long, default_value = "1")]
        exchanges: usize,
        /// Lose the return parcel and walk through the dispute
        #[arg(long)]
        lose: bool,
    },

    /// Print the status of a stored exchange
    Status {
        /// Marketplace exchange ID
        exchange: String,
        /// Exchange store file
        #[arg(short, long)]
        store: PathBuf,
        /// Print the raw status view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop identity mappings past their retention period
    Purge {
        /// Exchange store file
        #[arg(short, long)]
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "swapdrop=debug,info"
    } else {
        "swapdrop=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Keygen { output } => cmd_keygen(output).await,
        Commands::Pseudonym { party, exchange, secret } => cmd_pseudonym(&party, &exchange, &secret),
        Commands::Simulate {
            store,
            catalog,
            exchanges,
            lose,
        } => cmd_simulate(store.as_deref(), catalog.as_deref(), exchanges, lose).await,
        Commands::Status { exchange, store, json } => cmd_status(&exchange, &store, json).await,
        Commands::Purge { store } => cmd_purge(&store).await,
    }
}

#[derive(Serialize)]
struct KeyFile {
    server_secret: String,
    support_key: String,
}

/// Generate fresh engine keys
async fn cmd_keygen(output: Option<PathBuf>) -> Result<()> {
    println!("{}", "🔑 Generating Swapdrop keys...".cyan().bold());

    let keys = KeyFile {
        server_secret: ServerSecret::generate().to_hex(),
        support_key: SupportKey::generate().to_hex(),
    };

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&keys)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{} {}", "✓ Keys saved to".green(), path.display());
    } else {
        println!();
        println!("{}", "SWAPDROP_SERVER_SECRET".yellow());
        println!("{}", keys.server_secret);
        println!();
        println!("{}", "SWAPDROP_SUPPORT_KEY".yellow());
        println!("{}", keys.support_key);
    }

    println!();
    println!(
        "{}",
        "⚠  Keep both values secret. Rotating the server secret invalidates every issued code.".yellow()
    );
    Ok(())
}

/// Print a party's per-exchange pseudonym
fn cmd_pseudonym(party: &str, exchange: &str, secret: &str) -> Result<()> {
    let secret = ServerSecret::from_hex(secret).context("invalid server secret")?;
    let exchange_id = ExchangeId::new(exchange)?;
    let party_id = PartyId::new(party)?;

    let anonymizer = IdentityAnonymizer::new(Arc::new(secret), None, RelayConfig::default());
    let pseudonym = anonymizer.pseudonym(&exchange_id, party_id.as_str());

    println!("{} {}", "Exchange:".dimmed(), exchange_id);
    println!("{} {}", "Party:".dimmed(), party_id);
    println!("{} {}", "Pseudonym:".green().bold(), pseudonym);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a simulated run drives.
struct Simulation {
    engine: Engine,
    carrier: Arc<SimulatedCarrier>,
    notifier: Arc<RecordingNotifier>,
    operator: OperatorId,
}

/// Run one or many exchanges end to end
async fn cmd_simulate(store: Option<&Path>, catalog: Option<&Path>, count: usize, lose: bool) -> Result<()> {
    if count == 0 {
        bail!("--exchanges must be at least 1");
    }
    let sim = build_simulation(store, catalog).await?;

    if count == 1 {
        let exchange_id = ExchangeId::new(format!("sim-{}", Utc::now().timestamp_millis()))?;
        return run_verbose(&sim, exchange_id, lose).await;
    }

    println!("{}", format!("🚚 Simulating {} exchanges...", count).cyan().bold());

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let batch = Utc::now().timestamp_millis();
    let start = Instant::now();
    let mut completed = 0usize;
    let mut cancelled = 0usize;
    for i in 0..count {
        let exchange_id = ExchangeId::new(format!("sim-{}-{}", batch, i))?;
        let (alice, bob) = demo_parties(i)?;
        let plan = create(&sim, &exchange_id, alice, bob).await?;
        let status = if lose {
            lose_and_cancel(&sim, &plan).await?
        } else {
            happy_path(&sim, &plan).await?
        };
        match status.aggregate_status {
            ExchangeStatus::Completed => completed += 1,
            _ => cancelled += 1,
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    let elapsed = start.elapsed();

    println!();
    println!("{}", "📊 Results".cyan().bold());
    println!("   Exchanges:      {}", count);
    println!("   Completed:      {}", completed.to_string().green());
    println!("   Cancelled:      {}", cancelled.to_string().yellow());
    println!("   Labels issued:  {}", sim.carrier.labels().len());
    println!("   Notifications:  {}", sim.notifier.events().len());
    println!("   Total time:     {:?}", elapsed);
    println!("   Per exchange:   {:?}", elapsed / count as u32);
    Ok(())
}

async fn build_simulation(store: Option<&Path>, catalog: Option<&Path>) -> Result<Simulation> {
    let mut config = match EngineConfig::from_env() {
        Ok(config) if config.support_key.is_some() => config,
        _ => {
            warn!("no usable key configuration in the environment, generating ephemeral keys");
            EngineConfig::new(ServerSecret::generate(), Some(SupportKey::generate()))
        }
    };
    let operator = OperatorId::new(SIMULATION_OPERATOR)?;
    config.support_operators.push(operator.clone());

    let store: Arc<dyn ExchangeStore> = match store {
        Some(path) => Arc::new(
            FileExchangeStore::open(path)
                .await
                .with_context(|| format!("opening store {}", path.display()))?,
        ),
        None => Arc::new(MemoryExchangeStore::new()),
    };
    let catalog = match catalog {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading catalog {}", path.display()))?;
            StaticCatalog::from_json(&json).context("parsing pickup point catalog")?
        }
        None => demo_catalog(),
    };

    let carrier = Arc::new(SimulatedCarrier::new("sim-post"));
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::from_config(
        &config,
        store,
        carrier.clone(),
        notifier.clone(),
        Arc::new(catalog),
    )?;

    Ok(Simulation {
        engine,
        carrier,
        notifier,
        operator,
    })
}

/// One exchange, printing every step.
async fn run_verbose(sim: &Simulation, exchange_id: ExchangeId, lose: bool) -> Result<()> {
    println!("{}", "📦 Creating delivery...".cyan().bold());
    let (alice, bob) = demo_parties(0)?;
    let plan = create(sim, &exchange_id, alice, bob).await?;

    println!();
    println!("{} {}", "Exchange:".dimmed(), plan.exchange_id);
    for instructions in [&plan.instructions_a, &plan.instructions_b] {
        println!();
        println!("{} {}", "Party:".dimmed(), instructions.party_id.to_string().bold());
        println!("   {} {}", "Pseudonym:".dimmed(), instructions.pseudonym);
        println!("   {} {}", "Ships label:".dimmed(), instructions.ship.label.label_id);
        println!(
            "   {} {} ({})",
            "Collects at:".dimmed(),
            instructions.collect.pickup_point.name,
            instructions.collect.pickup_point.address.city
        );
        println!("   {} {}", "Withdrawal code:".dimmed(), instructions.collect.withdrawal_code.green());
    }
    println!();
    print_status(&sim.engine.orchestrator.get_status(&exchange_id).await?);

    let status = if lose {
        lose_and_cancel(sim, &plan).await?
    } else {
        happy_path(sim, &plan).await?
    };

    println!();
    println!("{}", "🏁 Final state".cyan().bold());
    print_status(&status);
    println!();
    println!("{} {}", "Notifications sent:".dimmed(), sim.notifier.events().len());
    Ok(())
}

async fn create(sim: &Simulation, exchange_id: &ExchangeId, alice: RealParty, bob: RealParty) -> Result<DeliveryPlan> {
    let request = NewExchange {
        exchange_id: exchange_id.clone(),
        item_a: ItemId::new(format!("{}-item-a", exchange_id))?,
        item_b: ItemId::new(format!("{}-item-b", exchange_id))?,
        party_a: alice,
        party_b: bob,
    };
    let plan = sim
        .engine
        .orchestrator
        .create_delivery(request)
        .await
        .with_context(|| format!("creating delivery {}", exchange_id))?;
    Ok(plan)
}

/// Both parcels ship, arrive through carrier tracking and are collected.
async fn happy_path(sim: &Simulation, plan: &DeliveryPlan) -> Result<StatusView> {
    let orchestrator = &sim.engine.orchestrator;
    let exchange_id = &plan.exchange_id;
    let legs = [
        (&plan.instructions_a, &plan.instructions_b),
        (&plan.instructions_b, &plan.instructions_a),
    ];

    for (sender, _) in legs {
        let tracking_ref = format!("TRK-{}", sender.ship.leg_id.as_uuid().simple());
        orchestrator
            .confirm_shipment(exchange_id, sender.ship.leg_id, &sender.party_id, &tracking_ref)
            .await
            .context("confirming shipment")?;
        sim.carrier
            .set_tracking(&tracking_ref, TrackingState::ReadyForPickup, "sorted at pickup point");
    }
    step("shipped", &orchestrator.get_status(exchange_id).await?);

    for (sender, _) in legs {
        let status = orchestrator
            .sync_tracking(exchange_id, sender.ship.leg_id)
            .await
            .context("syncing tracking")?;
        if status != LegStatus::Arrived {
            bail!("leg {} did not arrive: {}", sender.ship.leg_id, status);
        }
    }
    step("arrived", &orchestrator.get_status(exchange_id).await?);

    for (_, recipient) in legs {
        orchestrator
            .confirm_pickup(
                exchange_id,
                recipient.collect.leg_id,
                &recipient.party_id,
                &recipient.collect.withdrawal_code,
                true,
            )
            .await
            .context("confirming pickup")?;
    }
    let status = orchestrator.get_status(exchange_id).await?;
    step("collected", &status);
    Ok(status)
}

/// The return parcel is lost; support investigates and cancels the exchange.
async fn lose_and_cancel(sim: &Simulation, plan: &DeliveryPlan) -> Result<StatusView> {
    let orchestrator = &sim.engine.orchestrator;
    let disputes = &sim.engine.disputes;
    let exchange_id = &plan.exchange_id;
    let a = &plan.instructions_a;
    let b = &plan.instructions_b;

    let tracking_ref = format!("TRK-{}", a.ship.leg_id.as_uuid().simple());
    orchestrator
        .confirm_shipment(exchange_id, a.ship.leg_id, &a.party_id, &tracking_ref)
        .await
        .context("confirming shipment")?;
    step("outbound shipped", &orchestrator.get_status(exchange_id).await?);

    orchestrator
        .report_loss(
            exchange_id,
            b.ship.leg_id,
            &a.party_id,
            "return parcel never handed to the carrier",
        )
        .await
        .context("reporting loss")?;
    let status = orchestrator.get_status(exchange_id).await?;
    step("return lost", &status);

    let dispute_id = status.open_dispute.context("loss report opened no dispute")?;
    let (record_a, record_b) = disputes
        .reveal_identities(exchange_id, &sim.operator)
        .await
        .context("revealing identities")?;
    tracing::info!(
        dispute_id = %dispute_id,
        party_a = %record_a.real.id,
        party_b = %record_b.real.id,
        "support revealed both identities"
    );

    let status = disputes
        .resolve_dispute(exchange_id, dispute_id, &sim.operator, DisputeOutcome::CancelExchange)
        .await
        .context("resolving dispute")?;
    step("dispute resolved", &status);
    Ok(status)
}

fn step(label: &str, status: &StatusView) {
    tracing::debug!(exchange_id = %status.exchange_id, status = %status.aggregate_status, "{}", label);
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Print a stored exchange
async fn cmd_status(exchange: &str, store: &Path, json: bool) -> Result<()> {
    let exchange_id = ExchangeId::new(exchange)?;
    let store = FileExchangeStore::open(store)
        .await
        .with_context(|| format!("opening store {}", store.display()))?;
    let exchange = store
        .load_exchange(&exchange_id)
        .await?
        .with_context(|| format!("exchange {} not found", exchange_id))?;
    let view = StatusView::from(&exchange);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_status(&view);
    }
    Ok(())
}

/// Purge expired identity mappings in a store file
async fn cmd_purge(store: &Path) -> Result<()> {
    let config = EngineConfig::from_env().context("loading engine configuration")?;
    let store: Arc<dyn ExchangeStore> = Arc::new(
        FileExchangeStore::open(store)
            .await
            .with_context(|| format!("opening store {}", store.display()))?,
    );
    let engine = Engine::from_config(
        &config,
        store,
        Arc::new(SimulatedCarrier::new("offline")),
        Arc::new(LogNotifier),
        Arc::new(StaticCatalog::default()),
    )?;

    println!("{}", "🧹 Purging expired identity mappings...".cyan().bold());
    let purged = engine.orchestrator.purge_expired_mappings(Utc::now()).await?;
    println!("{} {}", "✓ Mappings purged:".green(), purged);
    Ok(())
}

fn print_status(view: &StatusView) {
    let status = view.aggregate_status.to_string();
    let status = match view.aggregate_status {
        ExchangeStatus::Completed => status.green().bold(),
        s if s.is_final() => status.red().bold(),
        _ => status.yellow().bold(),
    };
    println!("{} {} (v{})", "Status:".dimmed(), status, view.version);
    for leg in [&view.leg_a, &view.leg_b] {
        println!(
            "   {} {:<16} {} {}",
            leg.direction,
            leg.status.to_string(),
            "pickup:".dimmed(),
            leg.pickup_point_id
        );
    }
    println!(
        "   {} A: {:?}, B: {:?}",
        "Next:".dimmed(),
        view.next_action_a,
        view.next_action_b
    );
    if let Some(dispute) = view.open_dispute {
        println!("   {} {}", "Open dispute:".red(), dispute);
    }
    if view.compensated {
        println!("   {}", "Compensated".magenta());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEMO DATA
// ═══════════════════════════════════════════════════════════════════════════════

fn demo_parties(i: usize) -> Result<(RealParty, RealParty)> {
    let alice = RealParty {
        id: PartyId::new(format!("alice-{}", i))?,
        full_name: "Alice Martin".into(),
        phone: Some("+33 6 12 34 56 78".into()),
        email: Some("alice@example.org".into()),
        address: PostalAddress::new("14 Rue Oberkampf", "Paris", "75011", "FR"),
    };
    let bob = RealParty {
        id: PartyId::new(format!("bob-{}", i))?,
        full_name: "Bob Durand".into(),
        phone: None,
        email: Some("bob@example.org".into()),
        address: PostalAddress::new("8 Avenue Jean Jaurès", "Lyon", "69007", "FR"),
    };
    Ok((alice, bob))
}

fn demo_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        PickupPoint {
            id: "pp-paris-11".into(),
            name: "Relais Oberkampf".into(),
            address: PostalAddress::new("102 Rue Oberkampf", "Paris", "75011", "FR"),
            service_area: vec!["750".into()],
        },
        PickupPoint {
            id: "pp-lyon-7".into(),
            name: "Tabac Jean Macé".into(),
            address: PostalAddress::new("2 Place Jean Macé", "Lyon", "69007", "FR"),
            service_area: vec!["690".into()],
        },
    ])
}

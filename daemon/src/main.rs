//! VEIL daemon: entry point for running an election service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use veil_automation::{
    AutomationConfig, EligibilityIndex, EligibilityService, LedgerBackend, PhaseScheduler,
    RootSynchronizer, StartMode, TallyProjector,
};
use veil_ledger::ElectionLedger;
use veil_rpc::{AppState, RpcServer};
use veil_store::{AllowlistStore, ProjectionStore};
use veil_store_lmdb::LmdbEnvironment;
use veil_types::{Timestamp, VoterId};

#[derive(Parser)]
#[command(name = "veil-daemon", about = "VEIL commit-reveal election daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, default_value_t = 3001, env = "VEIL_PORT")]
    port: u16,

    /// Data directory for durable storage (allow-list, projections).
    #[arg(long, default_value = "./veil_data", env = "VEIL_DATA_DIR")]
    data_dir: PathBuf,

    /// Identifier of the election admin (also the automation operator).
    #[arg(long, default_value = "admin", env = "VEIL_ADMIN_ID")]
    admin_id: String,

    /// JSON file with an array of identifiers to seed the allow-list.
    #[arg(long, env = "VEIL_ALLOWLIST_SEED")]
    allowlist_seed: Option<PathBuf>,

    /// Candidates to add at startup (comma-separated names).
    #[arg(long, env = "VEIL_CANDIDATES", value_delimiter = ',')]
    candidates: Vec<String>,

    /// Commit phase duration in seconds (overrides config file).
    #[arg(long, env = "VEIL_COMMIT_DURATION")]
    commit_duration: Option<u64>,

    /// Reveal phase duration in seconds (overrides config file).
    #[arg(long, env = "VEIL_REVEAL_DURATION")]
    reveal_duration: Option<u64>,

    /// Start the phase clock immediately instead of waiting for the first
    /// admission.
    #[arg(long, env = "VEIL_START_IMMEDIATELY")]
    start_immediately: bool,

    /// Disable the automatic reset after a round finishes.
    #[arg(long, env = "VEIL_NO_AUTO_RESET")]
    no_auto_reset: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "VEIL_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "VEIL_LOG_FORMAT")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &cli.log_level);
    }
    if cli.log_format == "json" {
        veil_utils::logging::init_tracing_json();
    } else {
        veil_utils::init_tracing();
    }

    let mut config = match &cli.config {
        Some(path) => AutomationConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AutomationConfig::default(),
    };
    if let Some(secs) = cli.commit_duration {
        config.commit_duration_secs = secs;
    }
    if let Some(secs) = cli.reveal_duration {
        config.reveal_duration_secs = secs;
    }
    if cli.start_immediately {
        config.start_mode = StartMode::Immediate;
    }
    if cli.no_auto_reset {
        config.auto_reset = false;
    }

    let admin = VoterId::parse(&cli.admin_id)
        .map_err(|e| anyhow::anyhow!("invalid admin id: {e}"))?;
    info!(
        commit = %veil_utils::format_duration(config.commit_duration_secs),
        reveal = %veil_utils::format_duration(config.reveal_duration_secs),
        reset_grace = %veil_utils::format_duration(config.reset_grace_secs),
        auto_reset = config.auto_reset,
        "phase schedule configured"
    );

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating {}", cli.data_dir.display()))?;
    let env = LmdbEnvironment::open(&cli.data_dir)
        .with_context(|| format!("opening store at {}", cli.data_dir.display()))?;
    let allowlist: Arc<dyn AllowlistStore> = Arc::new(env.allowlist_store());
    let projections: Arc<dyn ProjectionStore> = Arc::new(env.projection_store());

    // The authoritative ledger, seeded with the configured candidates.
    let mut ledger = ElectionLedger::new(admin.clone());
    for name in cli.candidates.iter().filter(|n| !n.trim().is_empty()) {
        let id = ledger
            .add_candidate(&admin, name.trim())
            .map_err(|e| anyhow::anyhow!("seeding candidate {name:?}: {e}"))?;
        info!(%id, name = name.trim(), "candidate seeded");
    }
    let round = ledger.round();
    let backend = LedgerBackend::new(Arc::new(Mutex::new(ledger)), admin.clone());

    if let Some(path) = &cli.allowlist_seed {
        seed_allowlist(&*allowlist, path)?;
    }

    let index = Arc::new(EligibilityIndex::new(allowlist));
    let synchronizer = Arc::new(RootSynchronizer::new(
        backend.clone(),
        index.clone(),
        config.retry,
    ));
    let eligibility = Arc::new(EligibilityService::new(index, synchronizer.clone()));
    let scheduler = Arc::new(PhaseScheduler::new(backend.clone(), config.clone(), round));
    let projector = Arc::new(TallyProjector::new(
        backend.clone(),
        projections,
        config.projection_batch_size,
        config.projection_max_batches,
    ));

    // Publish the seeded allow-list root before serving.
    match synchronizer.sync(true).await {
        Ok(outcome) => info!(root = %synchronizer.local_root()?, ?outcome, "eligibility root published"),
        Err(e) => warn!(error = %e, "initial root sync failed; proofs will reject until it heals"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let state = Arc::new(AppState {
        backend,
        scheduler,
        eligibility,
        projector,
        election_id: config.election_id.clone(),
        started_at: Timestamp::now(),
    });

    let server = RpcServer::new(cli.port);
    tokio::select! {
        result = server.start(state) => {
            result.context("rpc server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    Ok(())
}

/// Seed the allow-list from a JSON array of identifiers (idempotent).
fn seed_allowlist(allowlist: &dyn AllowlistStore, path: &PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading allow-list seed {}", path.display()))?;
    let entries: Vec<String> =
        serde_json::from_str(&raw).context("allow-list seed must be a JSON array of strings")?;
    let mut added = 0u64;
    for entry in &entries {
        let voter = VoterId::parse(entry)
            .map_err(|e| anyhow::anyhow!("allow-list entry {entry:?}: {e}"))?;
        if allowlist.admit(&voter)? {
            added += 1;
        }
    }
    info!(total = entries.len(), added, "allow-list seeded");
    Ok(())
}

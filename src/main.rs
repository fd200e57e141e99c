//! Crowdfunding service.
//!
//! # Architecture Overview
//!
//! ```text
//!   social feed ──▶ poller ──▶ command grammar ──┬──▶ campaign ledger ──▶ settlement (Solana RPC)
//!                                                │         │                 ▲
//!                                                │         └──▶ price oracle │
//!                                                └──▶ challenge engines ─────┘
//!                                                          ▲
//!   HTTP clients ──▶ api ──────────────────────────────────┘
//!
//!   sweeper ──▶ ledger.sweep_expired + expired challenge/delivery cleanup
//!   all state ──▶ document store (in-process, JSON snapshot)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use xfunder::api::HttpServer;
use xfunder::chain::{Lamports, SolanaRpc, SolanaSettlement};
use xfunder::clock::SystemClock;
use xfunder::config::{load_envelope, load_or_default};
use xfunder::feed::TwitterFeed;
use xfunder::lifecycle::{signals, Shutdown};
use xfunder::notify::{Notifications, TelegramNotifier};
use xfunder::observability::{logging, metrics};
use xfunder::oracle::JupiterOracle;
use xfunder::poller::{Poller, PollerState};
use xfunder::services::{Collaborators, CoreSettings, Services};
use xfunder::store::MemoryStore;
use xfunder::sweeper::Sweeper;

#[derive(Debug, Parser)]
#[command(name = "xfunder", version, about = "Social-post crowdfunding service")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "xfunder starting");

    // The server secret is the root of trust; no secret, no start
    let envelope = Arc::new(load_envelope().inspect_err(|e| {
        tracing::error!(error = %e, "Server secret unavailable");
    })?);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let memory = Arc::new(match &config.store.snapshot_path {
        Some(path) => MemoryStore::with_snapshot(path)?,
        None => {
            tracing::warn!("No store snapshot path configured, state is lost on restart");
            MemoryStore::new()
        }
    });

    let settlement = Arc::new(SolanaSettlement::new(SolanaRpc::new(config.settlement.clone())?));
    let oracle = Arc::new(JupiterOracle::new(config.oracle.clone())?);
    let feed = Arc::new(TwitterFeed::new(config.feed.clone())?);

    let notifications = if config.notify.enabled {
        Notifications::new(
            Arc::new(TelegramNotifier::new(&config.notify)?),
            config.notify.frontend_url.clone(),
        )
    } else {
        Notifications::disabled()
    };

    let services = Arc::new(Services::new(
        Collaborators {
            store: memory.clone(),
            settlement,
            oracle,
            envelope,
            clock: Arc::new(SystemClock),
            notifications,
        },
        CoreSettings {
            campaigns: config.campaigns.clone(),
            challenges: config.challenges.clone(),
            fee_buffer: Lamports(config.settlement.fee_buffer_lamports),
            price_asset: config.oracle.asset.clone(),
        },
    ));

    tracing::info!(
        bind_address = %config.server.bind_address,
        handle = %config.feed.handle,
        rpc_url = %config.settlement.rpc_url,
        poller_interval_secs = config.poller.interval_secs,
        sweeper_interval_secs = config.sweeper.interval_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    if config.poller.enabled {
        let poller = Poller::new(services.clone(), feed, config.feed.handle.clone(), &config.poller);
        tasks.push(tokio::spawn(
            poller.run(PollerState::default(), shutdown.subscribe()),
        ));
    } else {
        tracing::info!("Poller disabled");
    }

    if config.sweeper.enabled {
        let sweeper = Sweeper::new(services.clone(), &config.sweeper);
        tasks.push(tokio::spawn(sweeper.run(shutdown.subscribe())));
    } else {
        tracing::info!("Sweeper disabled");
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&config.server, services);
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));
    server.run(listener, shutdown.subscribe()).await?;

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    memory.flush().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

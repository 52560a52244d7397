//! Crewflow server binary.
//!
//! Wires the storage, the core services and the broadcast hub together
//! and serves the HTTP API.

use anyhow::Result;
use clap::Parser;
use crewflow::cli::Cli;
use crewflow::config::AppConfig;
use crewflow::db::Database;
use crewflow::hub::BroadcastHub;
use crewflow::lifecycle::TaskLifecycle;
use crewflow::membership::WorkflowMembership;
use crewflow::server::{AppState, start_server};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crewflow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Arc::new(Database::open(&config.db_path)?);
    info!(db = %config.db_path.display(), "database opened");

    let hub = Arc::new(BroadcastHub::new());
    let heartbeat = hub.start_heartbeat(Duration::from_secs(config.heartbeat_secs));

    let state = AppState {
        hub: Arc::clone(&hub),
        lifecycle: Arc::new(TaskLifecycle::new(db.clone(), Arc::clone(&hub))),
        membership: Arc::new(WorkflowMembership::new(db.clone(), db.clone())),
    };

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let (shutdown_tx, _bound) = start_server(state, addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(());
    heartbeat.abort();

    Ok(())
}

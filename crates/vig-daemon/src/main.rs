//! vigd: the vig validator daemon.
//!
//! Single OS process running a Tokio async runtime: three periodic
//! cycles (ingestion, weight emission, pruning) against a local SQLite
//! database, plus the HTTP query API.

mod config;
mod epoch;
mod handlers;
mod http;
mod scheduler;

use std::sync::Arc;

use tracing::{error, info};

use vig_chain::emitter::{LogWeightEmitter, WeightEmitter};
use vig_chain::ledger::{HttpLedgerReader, LedgerReader};
use vig_crypto::ed25519::Ed25519Verifier;
use vig_crypto::Verifier;

use crate::config::DaemonConfig;
use crate::http::ApiServer;

/// Daemon-wide shared state.
///
/// The stores own all durable data; no cycle caches another's state
/// across runs, so a restart resumes from exactly what SQLite holds.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration, read once at startup.
    pub config: DaemonConfig,
    /// Registration signature verifier.
    pub verifier: Arc<dyn Verifier>,
    /// Betting-ledger reader.
    pub ledger: Arc<dyn LedgerReader>,
    /// Consensus-layer weight emitter.
    pub emitter: Arc<dyn WeightEmitter>,
    /// Held for the duration of an emission cycle; `try_lock` makes an
    /// overlapping cycle skip instead of queue.
    pub emission_guard: tokio::sync::Mutex<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config first so the log level applies from the start
    let config = DaemonConfig::load()?;

    let level = &config.advanced.log_level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "warn,vigd={level},vig_db={level},vig_chain={level},vig_registry={level},vig_scoring={level}"
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vig validator starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("vig.db");
    let conn = vig_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. External-chain boundaries
    let ledger: Arc<dyn LedgerReader> = Arc::new(HttpLedgerReader::new(
        &config.ledger.endpoint_url,
        config.ledger.request_timeout_secs,
    )?);
    let emitter: Arc<dyn WeightEmitter> = Arc::new(LogWeightEmitter::new());

    // 4. Build daemon state
    let state = Arc::new(DaemonState {
        db,
        config,
        verifier: Arc::new(Ed25519Verifier),
        ledger,
        emitter,
        emission_guard: tokio::sync::Mutex::new(()),
    });

    // 5. Start the scheduler cycles
    let cycle_handles = scheduler::spawn_cycles(state.clone());

    // 6. Run the API server until shutdown
    let server = ApiServer::new(
        state.clone(),
        state.config.api.listen_address.clone(),
        state.config.api.listen_port,
    );

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("API server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown: the cycles only touch durable state, so
    // aborting between operations is safe.
    for handle in cycle_handles {
        handle.abort();
    }

    info!("daemon stopped");
    Ok(())
}

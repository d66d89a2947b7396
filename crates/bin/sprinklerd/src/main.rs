//! # sprinklerd — irrigation controller daemon
//!
//! Composition root that wires all adapters together and runs the controller.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise tracing
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the record store and output adapters
//! - Load the catalog, initialise outputs and start the execution engine
//! - Spawn the update fan-out and serve the HTTP API
//! - Stop the engine on Ctrl-C so no valve is left open
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no controller logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use sprinkler_adapter_http_axum::state::AppState;
use sprinkler_adapter_storage_sqlite_sqlx::{Config as StorageConfig, SqliteRecordStore};
use sprinkler_adapter_virtual::VirtualOutputs;
use sprinkler_app::commands::CommandHandler;
use sprinkler_app::execution_engine::{EngineConfig, ExecutionEngine};
use sprinkler_app::ports::SystemClock;
use sprinkler_app::schedule_store::ScheduleStore;
use sprinkler_app::update_fanout::{DEFAULT_QUEUE_DEPTH, UpdateFanout, change_queue};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let records = SqliteRecordStore::new(db.pool().clone());

    // Store
    let outputs = VirtualOutputs::new(config.outputs.max_line);
    let (changes, change_rx) = change_queue(config.controller.queue_depth);
    let clock = SystemClock::new(config.timezone()?);
    let store = Arc::new(
        ScheduleStore::new(records, outputs, changes, clock)
            .with_lock_timeout(config.controller.lock_timeout()),
    );
    store.load_all().await?;

    // Engine
    let engine = Arc::new(ExecutionEngine::new(
        Arc::clone(&store),
        EngineConfig {
            queue_depth: config.controller.queue_depth,
            poll_interval: config.controller.poll_interval(),
            command_timeout: config.controller.lock_timeout(),
        },
    ));
    engine.init().await?;
    engine.start().await?;

    // Update fan-out
    let fanout = UpdateFanout::new(
        Arc::clone(&store),
        engine.subscribe(),
        change_rx,
        DEFAULT_QUEUE_DEPTH,
    );
    let updates = fanout.sender();
    let fanout_task = tokio::spawn(fanout.run());

    // HTTP
    let commands = CommandHandler::new(store, Arc::clone(&engine))
        .with_manual_zone_seconds(config.controller.manual_zone_seconds);
    let state = AppState::new(Arc::new(commands), updates);
    let app = sprinkler_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "sprinklerd listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(err) = engine.stop().await {
        tracing::warn!(error = %err, "engine was not running at shutdown");
    }
    fanout_task.abort();
    tracing::info!("sprinklerd stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

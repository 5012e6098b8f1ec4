mod config;
mod db;
mod error;
mod middlewares;
mod models;
mod reconciler;
mod reward;
mod routes;
mod simulator;
mod store;

use crate::config::Config;
use crate::db::{connect_to_mongo, seed_nodes};
use crate::reconciler::UserReconciler;
use crate::routes::create_router;
use crate::simulator::PaymentSimulator;
use crate::store::{DocumentStore, MongoStore};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub reconciler: Arc<UserReconciler>,
    pub admin_key: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reconciler: Arc<UserReconciler>,
        admin_key: &str,
    ) -> Self {
        Self {
            store,
            reconciler,
            admin_key: Arc::from(admin_key),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ethnode_backend=debug")),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_default_admin_key() {
        warn!("ADMIN_KEY is not set, using the development default");
    }

    let db = connect_to_mongo(&config).await?;
    let mongo = MongoStore::new(db);
    mongo.ensure_indexes().await.context("failed to ensure indexes")?;
    let store: Arc<dyn DocumentStore> = Arc::new(mongo);

    if let Some(path) = &config.seed_nodes_path {
        seed_nodes(store.as_ref(), path).await?;
    }

    let simulator = config.simulate_payment.then(|| {
        PaymentSimulator::new(Arc::clone(&store), config.simulated_payment_delay)
    });
    if let Some(simulator) = &simulator {
        warn!(
            delay_secs = simulator.delay().as_secs(),
            "payment simulation enabled, registrations will be marked paid automatically"
        );
    }

    let reconciler = Arc::new(UserReconciler::new(Arc::clone(&store), simulator));
    let state = AppState::new(store, Arc::clone(&reconciler), &config.admin_key);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(simulator) = reconciler.simulator() {
        simulator.shutdown();
    }
    Ok(())
}

//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Reconciler context (client, handler, config, backoff state)
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Signals the HTTP server to stop
    pub server_shutdown: Arc<Notify>,
    /// HTTP server task
    pub server_handle: JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("config", &self.reconciler.config)
            .finish_non_exhaustive()
    }
}

impl InitializationResult {
    /// Stop the HTTP server and wait for it to exit
    pub async fn shutdown(self) {
        self.server_shutdown.notify_one();
        if let Err(e) = self.server_handle.await {
            error!("HTTP server task failed: {}", e);
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("age_secret_controller={}", config.log_level).into());

    let result = if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Configuration from the environment
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(&config)?;

    info!("Starting AgeSecret Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Watching namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_shutdown = Arc::new(Notify::new());

    let server_port = config.metrics_port;
    let state = Arc::clone(&server_state);
    let shutdown = Arc::clone(&server_shutdown);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, state, async move {
            shutdown.notified().await;
        })
        .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = Arc::new(Reconciler::new(client, config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        reconciler,
        server_state,
        server_shutdown,
        server_handle,
    })
}

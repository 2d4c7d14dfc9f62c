//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{ControllerConfig, FunctionConfig};
use crate::constants::COMMIT_ORDER_SWEEP_PERIOD;
use crate::controller::client::KubeFunctionClient;
use crate::controller::git::GitCliFetcher;
use crate::controller::health::{HealthAck, HealthCheckRequests, HealthChecker};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::Function;
use crate::observability::{logging, Metrics};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for Function CRD, all namespaces
    pub functions: Api<Function>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
    /// Synthetic reconcile requests sent by the liveness probe
    pub health_requests: HealthCheckRequests,
    /// Channel the watch loop confirms liveness requests on
    pub health_ack: HealthAck,
    /// Periodic cleanup of the commit order map
    pub commit_order_sweep: JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Function configuration loading
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup and the commit order sweep
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any rustls client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let controller_config = ControllerConfig::from_env();
    logging::init_tracing(controller_config.json_logs());

    info!("Starting Function Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let function_config = FunctionConfig::load(&controller_config.function_config_path)
        .context("Failed to load function configuration")?;
    debug!("Function configuration: {:?}", function_config);

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let (health, health_requests, health_ack) =
        HealthChecker::new(Arc::clone(&metrics), controller_config.health_check_timeout());
    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
        metrics: Arc::clone(&metrics),
        health: Arc::new(health),
    });

    // Start HTTP server for metrics and probes
    let server_state_clone = server_state.clone();
    let server_port = controller_config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let functions: Api<Function> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeFunctionClient::new(client.clone())),
        function_config,
        Arc::new(GitCliFetcher::new(controller_config.git_ls_remote_timeout())),
        metrics,
        controller_config.git_order_wait(),
    ));

    let commit_order_sweep = reconciler
        .commit_checker
        .start_cache_sweep(COMMIT_ORDER_SWEEP_PERIOD, reconciler.cancel.child_token());

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        functions,
        reconciler,
        server_state,
        controller_config,
        health_requests,
        health_ack,
        commit_order_sweep,
    })
}

//! # Function Controller
//!
//! A Kubernetes controller that runs `Function` resources without an image build.
//!
//! ## Overview
//!
//! For every `Function` the controller:
//!
//! 1. **Validates the Function** - Runtime, environment variables, labels and annotations
//! 2. **Resolves git sources** - Looks up the latest commit of the configured reference
//! 3. **Builds a Deployment** - Runtime base image with the source fetched at pod startup
//! 4. **Exposes a Service** - Port 80 forwarding to the function container
//! 5. **Reports readiness** - `ConfigurationReady` and `Running` conditions on the status
//!
//! ## Features
//!
//! - **Multi-namespace**: Watches `Function` resources across all namespaces
//! - **Owned objects**: Changes to the Deployment or Service trigger a reconciliation
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: Liveness is confirmed through the reconcile loop itself

use anyhow::Result;
use function_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await
}

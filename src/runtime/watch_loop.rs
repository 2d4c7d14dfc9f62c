//! # Watch Loop
//!
//! Controller watch loop that monitors Function resources, plus the Deployments and
//! Services they own, and triggers reconciliation when changes are detected.
//!
//! Liveness probe requests enter through `reconcile_on`. They never match a Function in
//! the cache, so they come out of the controller stream as `ObjectNotFound` and are
//! confirmed there.

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::runtime::reflector::ObjectRef;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use super::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use super::InitializationResult;
use crate::controller::health::{acknowledge, is_health_check_request, HealthCheckRequests};
use crate::controller::reconciler::reconcile;
use crate::crd::Function;

/// Run the controller watch loop
///
/// Restarts the controller when its stream ends, until a shutdown signal arrives.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        functions,
        reconciler,
        server_state,
        controller_config,
        health_requests,
        health_ack,
        commit_order_sweep,
    } = init;

    // Mark the server as not ready and stop in-flight work on SIGTERM/SIGINT
    let shutdown_server_state = server_state.clone();
    let shutdown_cancel = reconciler.cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
        shutdown_cancel.cancel();
    });

    // Shared so the requests survive a controller restart
    let health_requests = Arc::new(Mutex::new(health_requests));
    let error_requeue = controller_config.reconciliation_error_requeue_duration();
    let watch_restart_delay = controller_config.watch_restart_delay();

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let ack = health_ack.clone();
        Controller::new(functions.clone(), watcher::Config::default().any_semantic())
            .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
            .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
            .reconcile_on(health_request_stream(Arc::clone(&health_requests)))
            .shutdown_on_signal()
            .run(
                reconcile,
                move |function, error, ctx| {
                    handle_reconciliation_error(function, error, ctx, error_requeue)
                },
                reconciler.clone(),
            )
            .for_each(|result| {
                let ack = ack.clone();
                async move {
                    match result {
                        Ok((object, _action)) => {
                            debug!("Reconciled {}", object);
                        }
                        Err(controller::Error::ObjectNotFound(object))
                            if is_health_check_request(&object.name) =>
                        {
                            acknowledge(&ack).await;
                        }
                        Err(e) => {
                            handle_watch_stream_error(&format!("{e:?}"), watch_restart_delay)
                                .await;
                        }
                    }
                }
            })
            .instrument(watch_span)
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {:?}...",
            watch_restart_delay
        );
        tokio::time::sleep(watch_restart_delay).await;
    }

    reconciler.cancel.cancel();
    if let Err(e) = commit_order_sweep.await {
        warn!("Commit order sweep ended abnormally: {}", e);
    }
    info!("Controller stopped gracefully");
    Ok(())
}

/// Stream of liveness requests that can be rebuilt after a controller restart
fn health_request_stream(
    requests: Arc<Mutex<HealthCheckRequests>>,
) -> impl Stream<Item = ObjectRef<Function>> + Send + 'static {
    futures::stream::unfold(requests, |requests| async move {
        let request = requests.lock().await.next().await;
        request.map(|request| (request, requests))
    })
}

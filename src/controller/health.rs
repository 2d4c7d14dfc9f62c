//! # Health Checker
//!
//! Liveness probe for the reconcile loop.
//!
//! The loop counts as alive when it finished at least one reconciliation since the previous
//! probe. Otherwise a synthetic request is pushed into the controller and the probe waits
//! for the controller to acknowledge it. Reconciliations still in flight never fail the
//! probe on their own: the controller runs them concurrently with the synthetic request.

use futures::channel::mpsc;
use futures::SinkExt;
use kube::runtime::reflector::ObjectRef;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc as ack, Mutex};
use tracing::{debug, info, warn};

use crate::constants::{HEALTH_ACK_TIMEOUT, HEALTH_EVENT};
use crate::crd::Function;
use crate::observability::Metrics;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("timeout when sending check event")]
    SendTimeout,
    #[error("reconcile didn't send confirmation")]
    NoConfirmation,
    #[error("health check channel closed")]
    ChannelClosed,
}

/// Requests fed into the controller's `reconcile_on` stream
pub type HealthCheckRequests = mpsc::Receiver<ObjectRef<Function>>;

/// Sender the controller acknowledges health check requests on
pub type HealthAck = ack::Sender<()>;

pub struct HealthChecker {
    metrics: Arc<Metrics>,
    check_tx: Mutex<mpsc::Sender<ObjectRef<Function>>>,
    ack_rx: Mutex<ack::Receiver<()>>,
    timeout: Duration,
    previous_total: AtomicU64,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("timeout", &self.timeout)
            .field("previous_total", &self.previous_total)
            .finish_non_exhaustive()
    }
}

impl HealthChecker {
    /// Build a checker plus the two controller-side channel ends
    pub fn new(metrics: Arc<Metrics>, timeout: Duration) -> (Self, HealthCheckRequests, HealthAck) {
        let (check_tx, check_rx) = mpsc::channel(0);
        let (ack_tx, ack_rx) = ack::channel(1);
        let checker = Self {
            metrics,
            check_tx: Mutex::new(check_tx),
            ack_rx: Mutex::new(ack_rx),
            timeout,
            previous_total: AtomicU64::new(0),
        };
        (checker, check_rx, ack_tx)
    }

    pub async fn check(&self) -> Result<(), HealthError> {
        debug!("Liveness check triggered");

        let total = self.metrics.reconcile_total();
        let previous = self.previous_total.swap(total, Ordering::SeqCst);
        if total > previous {
            debug!(
                "reconcile loop is healthy based on metrics, total reconciled prev -> now: {} -> {}",
                previous, total
            );
            return Ok(());
        }

        debug!(
            "no reconciliation finished since previous check, {} in flight",
            self.metrics.active_workers()
        );
        self.round_trip().await
    }

    /// Push a synthetic request through the controller and wait for its acknowledgement
    async fn round_trip(&self) -> Result<(), HealthError> {
        let mut ack_rx = self.ack_rx.lock().await;
        // Acknowledgements of probes that already timed out
        while ack_rx.try_recv().is_ok() {}

        {
            let mut check_tx = self.check_tx.lock().await;
            match tokio::time::timeout(self.timeout, check_tx.send(health_request())).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(HealthError::ChannelClosed),
                Err(_elapsed) => return Err(HealthError::SendTimeout),
            }
        }
        debug!("check event sent to reconcile loop");

        match tokio::time::timeout(self.timeout, ack_rx.recv()).await {
            Ok(Some(())) => {
                debug!("reconcile loop is healthy");
                Ok(())
            }
            Ok(None) => Err(HealthError::ChannelClosed),
            Err(_elapsed) => {
                warn!("reconcile loop did not confirm the check event");
                Err(HealthError::NoConfirmation)
            }
        }
    }
}

fn health_request() -> ObjectRef<Function> {
    ObjectRef::new(HEALTH_EVENT)
}

#[must_use]
pub fn is_health_check_request(name: &str) -> bool {
    name == HEALTH_EVENT
}

/// Confirm a health check request, giving up after a short timeout
pub async fn acknowledge(ack_tx: &HealthAck) {
    match ack_tx.send_timeout((), HEALTH_ACK_TIMEOUT).await {
        Ok(()) => debug!("health check confirmed"),
        Err(e) => info!("health check confirmation dropped: {}", e),
    }
}

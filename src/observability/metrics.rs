//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `function_controller_reconciliations_total` - Reconciliations started, by runtime
//! - `function_controller_functions_processed_total` - Functions seen for the first time, by runtime
//! - `function_controller_reconciliation_duration_seconds` - Duration of a full state machine run
//! - `function_controller_state_reach_time_seconds` - Time from first reconciliation to a state
//! - `function_controller_reconciliation_errors_total` - Reconciliations that returned an error
//! - `function_controller_version_info` - Build version
//! - `controller_runtime_active_workers` - Reconciliations currently in flight
//! - `controller_runtime_reconcile_total` - Finished reconciliations, by result
//!
//! The last two keep the names used by controller-runtime so existing dashboards can read
//! them. kube-runtime keeps its pending queue private, so no `workqueue_depth` is exported.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::constants::CONTROLLER_NAME;

/// Result label values of `controller_runtime_reconcile_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    Success,
    Requeue,
    RequeueAfter,
    Error,
}

impl ReconcileResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileResult::Success => "success",
            ReconcileResult::Requeue => "requeue",
            ReconcileResult::RequeueAfter => "requeue_after",
            ReconcileResult::Error => "error",
        }
    }
}

/// Registry and collectors of the controller, built once and shared
pub struct Metrics {
    registry: Registry,
    reconciliations_total: IntCounterVec,
    functions_processed_total: IntCounterVec,
    reconciliation_duration: HistogramVec,
    state_reach_time: HistogramVec,
    reconciliation_errors_total: IntCounter,
    active_workers: IntGaugeVec,
    reconcile_total: IntCounterVec,
    seen_functions: Mutex<HashSet<String>>,
    state_reach_start: Mutex<HashMap<String, Instant>>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create all collectors and register them in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations_total = IntCounterVec::new(
            Opts::new(
                "function_controller_reconciliations_total",
                "Total number of Function reconciliations",
            ),
            &["runtime"],
        )?;
        let functions_processed_total = IntCounterVec::new(
            Opts::new(
                "function_controller_functions_processed_total",
                "Total number of distinct Functions processed",
            ),
            &["runtime"],
        )?;
        let reconciliation_duration = HistogramVec::new(
            HistogramOpts::new(
                "function_controller_reconciliation_duration_seconds",
                "Duration of a Function reconciliation in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            &["runtime"],
        )?;
        let state_reach_time = HistogramVec::new(
            HistogramOpts::new(
                "function_controller_state_reach_time_seconds",
                "Time from the first reconciliation of a Function to reaching a state",
            )
            .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
            &["state"],
        )?;
        let reconciliation_errors_total = IntCounter::new(
            "function_controller_reconciliation_errors_total",
            "Total number of reconciliation errors",
        )?;
        let active_workers = IntGaugeVec::new(
            Opts::new(
                "controller_runtime_active_workers",
                "Number of currently used workers per controller",
            ),
            &["controller"],
        )?;
        let reconcile_total = IntCounterVec::new(
            Opts::new(
                "controller_runtime_reconcile_total",
                "Total number of reconciliations per controller",
            ),
            &["controller", "result"],
        )?;
        let version_info = IntGaugeVec::new(
            Opts::new(
                "function_controller_version_info",
                "Build version of the controller",
            ),
            &["version"],
        )?;
        version_info
            .with_label_values(&[env!("BUILD_GIT_HASH")])
            .set(1);

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(functions_processed_total.clone()))?;
        registry.register(Box::new(reconciliation_duration.clone()))?;
        registry.register(Box::new(state_reach_time.clone()))?;
        registry.register(Box::new(reconciliation_errors_total.clone()))?;
        registry.register(Box::new(active_workers.clone()))?;
        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(version_info))?;

        Ok(Self {
            registry,
            reconciliations_total,
            functions_processed_total,
            reconciliation_duration,
            state_reach_time,
            reconciliation_errors_total,
            active_workers,
            reconcile_total,
            seen_functions: Mutex::new(HashSet::new()),
            state_reach_start: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Count a reconciliation and, the first time a Function UID shows up, a processed Function
    pub fn record_reconciliation_start(&self, uid: &str, runtime: &str) {
        self.reconciliations_total
            .with_label_values(&[runtime])
            .inc();

        let first_seen = self
            .seen_functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uid.to_string());
        if first_seen {
            self.functions_processed_total
                .with_label_values(&[runtime])
                .inc();
        }
    }

    /// Remember when a Function was first reconciled, later calls keep the first instant
    pub fn start_state_reach_timer(&self, uid: &str) {
        self.state_reach_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(uid.to_string())
            .or_insert_with(Instant::now);
    }

    /// Observe the time elapsed since the Function's timer was started
    pub fn publish_state_reach_time(&self, uid: &str, state: &str) {
        let started = self
            .state_reach_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uid)
            .copied();
        if let Some(started) = started {
            self.state_reach_time
                .with_label_values(&[state])
                .observe(started.elapsed().as_secs_f64());
        }
    }

    /// Drop the per-Function bookkeeping of a deleted Function
    pub fn forget_function(&self, uid: &str) {
        self.seen_functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
        self.state_reach_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
    }

    /// Functions with per-Function bookkeeping
    pub fn tracked_functions(&self) -> usize {
        self.seen_functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn observe_reconciliation_duration(&self, runtime: &str, duration: Duration) {
        self.reconciliation_duration
            .with_label_values(&[runtime])
            .observe(duration.as_secs_f64());
    }

    pub fn increment_reconciliation_errors(&self) {
        self.reconciliation_errors_total.inc();
    }

    pub fn inc_active_workers(&self) {
        self.active_workers
            .with_label_values(&[CONTROLLER_NAME])
            .inc();
    }

    pub fn dec_active_workers(&self) {
        self.active_workers
            .with_label_values(&[CONTROLLER_NAME])
            .dec();
    }

    /// Reconciliations running right now
    pub fn active_workers(&self) -> i64 {
        self.active_workers
            .with_label_values(&[CONTROLLER_NAME])
            .get()
    }

    pub fn record_reconcile_result(&self, result: ReconcileResult) {
        self.reconcile_total
            .with_label_values(&[CONTROLLER_NAME, result.as_str()])
            .inc();
    }

    /// Sum of `controller_runtime_reconcile_total` over all results
    pub fn reconcile_total(&self) -> u64 {
        [
            ReconcileResult::Success,
            ReconcileResult::Requeue,
            ReconcileResult::RequeueAfter,
            ReconcileResult::Error,
        ]
        .into_iter()
        .map(|result| {
            self.reconcile_total
                .with_label_values(&[CONTROLLER_NAME, result.as_str()])
                .get()
        })
        .sum()
    }
}

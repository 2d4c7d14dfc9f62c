//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: tracing subscriber setup

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, ReconcileResult};

//! # Runtime
//!
//! Process wiring of the controller binary.
//!
//! - `initialization.rs` - rustls, tracing, metrics, HTTP server, client and reconciler setup
//! - `watch_loop.rs` - kube-runtime controller over Functions and their owned objects
//! - `error_policy.rs` - Requeue of failed reconciliations and watch error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;

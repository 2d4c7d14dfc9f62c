//! # Controller
//!
//! Core controller modules for the Function Controller.
//!
//! - `client`: Kubernetes API calls behind a trait
//! - `git`: Git credentials and latest-commit lookups
//! - `health`: Liveness check of the reconcile loop
//! - `reconciler`: State machine converging a Function
//! - `resources`: Desired Deployment and Service of a Function
//! - `server`: HTTP server for metrics and health checks

pub mod client;
pub mod git;
pub mod health;
pub mod reconciler;
pub mod resources;
pub mod server;

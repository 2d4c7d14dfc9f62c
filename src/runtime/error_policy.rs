//! # Error Policy
//!
//! Error handling for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::Function;

/// Requeue a failed Function
///
/// A delay requested by the failing state wins over `default_delay`.
pub fn handle_reconciliation_error(
    function: Arc<Function>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
    default_delay: Duration,
) -> Action {
    let name = function.name_any();
    let namespace = function.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    ctx.metrics.increment_reconciliation_errors();

    let delay = error.retry_after().unwrap_or(default_delay);
    warn!("Retrying {}/{} in {:?}", namespace, name, delay);
    Action::requeue(delay)
}

/// Kind of a watch stream error, decides how long the loop waits before going on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    /// Resource version expired, the watcher relists on its own
    Expired,
    TooManyRequests,
    NotFound,
    Other,
}

/// Classify a watch stream error from its debug representation
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 first, a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::TooManyRequests;
    }
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    WatchErrorKind::Other
}

/// Log a watch stream error and back off where the API server asks for it
pub async fn handle_watch_stream_error(error_string: &str, watch_restart_delay: Duration) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );

    let back_off = error_span.in_scope(|| match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            warn!(
                "⏳ Waiting {:?} before continuing (RBAC may need time to propagate)...",
                watch_restart_delay
            );
            true
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
            false
        }
        WatchErrorKind::TooManyRequests => {
            warn!(
                "API server storage reinitializing (429), backing off for {:?}...",
                watch_restart_delay
            );
            true
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - this may be normal if a Function was deleted. Error: {}",
                error_string
            );
            false
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            false
        }
    });

    if back_off {
        tokio::time::sleep(watch_restart_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_error() {
        assert_eq!(
            classify_watch_error("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("WatchFailed: too old resource version"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::TooManyRequests
        );
        assert_eq!(
            classify_watch_error("WatchFailed: invalid type: integer `404`"),
            WatchErrorKind::NotFound
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorKind::Other);
    }
}

//! # Types
//!
//! Core types for the reconciler.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::FunctionConfig;
use crate::controller::client::FunctionClient;
use crate::controller::git::{AsyncLatestCommitChecker, LatestCommitFetcher, RepoLastCommitCache};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0:#}")]
    ReconciliationFailed(#[from] anyhow::Error),
    /// Failed, but the failing state asked for its own retry delay
    #[error("Reconciliation failed, retrying in {after:?}: {source:#}")]
    Retry {
        after: Duration,
        source: anyhow::Error,
    },
    #[error("Failed to update Function status: {0:#}")]
    StatusUpdate(anyhow::Error),
    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl ReconcilerError {
    /// Retry delay requested by the failing state, if any
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ReconcilerError::Retry { after, .. } => Some(*after),
            _ => None,
        }
    }
}

/// How a finished reconciliation wants to be scheduled again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// As soon as the queue allows
    Immediate,
    After(Duration),
}

impl Requeue {
    #[must_use]
    pub fn delay(self) -> Duration {
        match self {
            Requeue::Immediate => Duration::ZERO,
            Requeue::After(after) => after,
        }
    }
}

/// Shared context of all reconciliations
pub struct Reconciler {
    pub client: Arc<dyn FunctionClient>,
    pub function_config: FunctionConfig,
    pub commit_checker: AsyncLatestCommitChecker,
    /// Commits per `(url, reference)`, valid for `function_ready_requeue_duration`
    pub commit_cache: RepoLastCommitCache,
    pub metrics: Arc<Metrics>,
    /// Upper bound for waiting on a commit order within one reconciliation
    pub git_order_wait: Duration,
    /// Cancelled on shutdown, checked between states
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("function_config", &self.function_config)
            .field("commit_checker", &self.commit_checker)
            .field("git_order_wait", &self.git_order_wait)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn FunctionClient>,
        function_config: FunctionConfig,
        fetcher: Arc<dyn LatestCommitFetcher>,
        metrics: Arc<Metrics>,
        git_order_wait: Duration,
    ) -> Self {
        let commit_cache = RepoLastCommitCache::new(function_config.function_ready_requeue_duration);
        Self {
            client,
            function_config,
            commit_checker: AsyncLatestCommitChecker::new(fetcher),
            commit_cache,
            metrics,
            git_order_wait,
            cancel: CancellationToken::new(),
        }
    }
}

//! # Async Latest-Commit Checker
//!
//! Commit lookups can take seconds, so reconciliations never wait on them directly.
//! A reconciliation places an order keyed by its Function and collects the result on a
//! later pass. While an order is in flight, repeated `place_order` calls are no-ops.
//!
//! Map entries:
//! - `None` - order placed, lookup running
//! - `Some(result)` - lookup finished, waiting to be collected

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GitAuth, GitError, LatestCommitFetcher};
use crate::constants::COMMIT_ORDER_LIFETIME;

/// Finished lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResult {
    pub result: Result<String, GitError>,
    pub completed_at: Instant,
}

type Orders = Arc<Mutex<HashMap<String, Option<OrderResult>>>>;

#[derive(Clone)]
pub struct AsyncLatestCommitChecker {
    fetcher: Arc<dyn LatestCommitFetcher>,
    orders: Orders,
    order_lifetime: Duration,
}

impl std::fmt::Debug for AsyncLatestCommitChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLatestCommitChecker")
            .field("orders", &self.len())
            .field("order_lifetime", &self.order_lifetime)
            .finish_non_exhaustive()
    }
}

impl AsyncLatestCommitChecker {
    pub fn new(fetcher: Arc<dyn LatestCommitFetcher>) -> Self {
        Self::with_order_lifetime(fetcher, COMMIT_ORDER_LIFETIME)
    }

    pub fn with_order_lifetime(
        fetcher: Arc<dyn LatestCommitFetcher>,
        order_lifetime: Duration,
    ) -> Self {
        Self {
            fetcher,
            orders: Arc::new(Mutex::new(HashMap::new())),
            order_lifetime,
        }
    }

    /// Start a lookup for `order_id` unless one is already known
    ///
    /// Never blocks. A finished result older than the order lifetime was abandoned by
    /// its reconciliation and is replaced by a fresh lookup.
    pub fn place_order(
        &self,
        order_id: &str,
        repo_url: &str,
        reference: &str,
        auth: Option<GitAuth>,
    ) {
        {
            let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
            match orders.entry(order_id.to_string()) {
                Entry::Occupied(mut entry) => {
                    let stale = entry
                        .get()
                        .as_ref()
                        .is_some_and(|r| r.completed_at.elapsed() > self.order_lifetime);
                    if !stale {
                        return;
                    }
                    debug!("Replacing abandoned commit order {}", order_id);
                    entry.insert(None);
                }
                Entry::Vacant(entry) => {
                    entry.insert(None);
                }
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let orders = Arc::clone(&self.orders);
        let order_id = order_id.to_string();
        let repo_url = repo_url.to_string();
        let reference = reference.to_string();
        tokio::spawn(async move {
            let result = fetcher
                .latest_commit(&repo_url, &reference, auth.as_ref())
                .await;
            debug!(
                "Commit order {} for {}@{} finished (ok={})",
                order_id,
                repo_url,
                reference,
                result.is_ok()
            );
            orders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    order_id,
                    Some(OrderResult {
                        result,
                        completed_at: Instant::now(),
                    }),
                );
        });
    }

    /// Take the finished result of `order_id`
    ///
    /// Returns `None` while the lookup runs or when nothing was ordered. A returned result
    /// is removed, so it is handed out once.
    pub fn collect_order(&self, order_id: &str) -> Option<OrderResult> {
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        match orders.entry(order_id.to_string()) {
            Entry::Occupied(entry) if entry.get().is_some() => entry.remove(),
            _ => None,
        }
    }

    /// Number of known orders, finished or not
    pub fn len(&self) -> usize {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every order
    pub fn clear(&self) {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Periodically clear all orders until `cancel` fires
    pub fn start_cache_sweep(
        &self,
        period: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let checker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Commit order sweep stopped");
                        return;
                    }
                    _ = interval.tick() => {
                        info!("Sweeping {} commit orders", checker.len());
                        checker.clear();
                    }
                }
            }
        })
    }
}

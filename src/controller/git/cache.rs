//! # Last-Commit Cache
//!
//! Remembers the latest commit of a `(url, reference)` pair so that Functions sharing a
//! repository, or reconciled again shortly after, skip the remote lookup.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RepoLastCommitCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), (String, Instant)>>,
}

impl RepoLastCommitCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached commit, `None` when absent or expired
    pub fn get(&self, url: &str, reference: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (url.to_string(), reference.to_string());
        match entries.get(&key) {
            Some((commit, stored)) if stored.elapsed() < self.ttl => Some(commit.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, url: &str, reference: &str, commit: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (url.to_string(), reference.to_string()),
                (commit.to_string(), Instant::now()),
            );
    }

    pub fn delete(&self, url: &str, reference: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(url.to_string(), reference.to_string()));
    }
}

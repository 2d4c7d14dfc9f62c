//! # Git Sources
//!
//! Everything the controller needs to follow a Function's git repository:
//!
//! - `auth.rs` - Credentials from Kubernetes Secrets
//! - `remote.rs` - Latest commit of a branch or tag via `git ls-remote`
//! - `checker.rs` - Non-blocking, deduplicated commit lookups
//! - `cache.rs` - Short-lived `(url, reference) -> commit` cache

mod auth;
mod cache;
mod checker;
mod remote;

pub use auth::{
    GitAuth, GitAuthError, APP_REPOSITORY_AUTH_TYPE, APP_REPOSITORY_KEY, APP_REPOSITORY_PASSWORD,
    APP_REPOSITORY_USERNAME,
};
pub use cache::RepoLastCommitCache;
pub use checker::{AsyncLatestCommitChecker, OrderResult};
pub use remote::{resolve_reference, GitCliFetcher, GitError, LatestCommitFetcher};

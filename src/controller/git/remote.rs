//! # Remote Commit Lookup
//!
//! Resolves the commit a branch or tag currently points to with `git ls-remote`,
//! without cloning the repository.

use async_trait::async_trait;
use base64::Engine;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::GitAuth;

/// Commit lookup failure
///
/// Kept cloneable so a result can be stored and handed out by the commit checker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("reference not found")]
    ReferenceNotFound,
    #[error("git ls-remote timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Command(String),
}

impl GitError {
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, GitError::AuthenticationRequired)
    }
}

/// Source of the latest commit of a repository reference
#[async_trait]
pub trait LatestCommitFetcher: Send + Sync {
    async fn latest_commit(
        &self,
        url: &str,
        reference: &str,
        auth: Option<&GitAuth>,
    ) -> Result<String, GitError>;
}

/// Fetcher backed by the `git` binary
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    timeout: Duration,
}

impl GitCliFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl LatestCommitFetcher for GitCliFetcher {
    async fn latest_commit(
        &self,
        url: &str,
        reference: &str,
        auth: Option<&GitAuth>,
    ) -> Result<String, GitError> {
        let mut command = Command::new("git");
        command
            .args(ls_remote_args(url))
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        // Kept alive until the command finishes
        let _key_file = match auth {
            Some(auth) => configure_auth(&mut command, auth)?,
            None => None,
        };

        debug!("Running git ls-remote for {} ({})", url, reference);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_elapsed| GitError::Timeout(self.timeout))?
            .map_err(|e| GitError::Command(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_auth_failure(&stderr) {
                return Err(GitError::AuthenticationRequired);
            }
            return Err(GitError::Command(stderr.trim().to_string()));
        }

        resolve_reference(&String::from_utf8_lossy(&output.stdout), reference)
            .ok_or(GitError::ReferenceNotFound)
    }
}

/// `--` ends option parsing, so a url starting with `-` is never taken for a flag
fn ls_remote_args(url: &str) -> [&str; 5] {
    ["ls-remote", "--heads", "--tags", "--", url]
}

/// Pass credentials to git through the environment, returns the key file to keep alive
fn configure_auth(
    command: &mut Command,
    auth: &GitAuth,
) -> Result<Option<tempfile::NamedTempFile>, GitError> {
    if let Some((username, password)) = auth.basic_credentials() {
        let token =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        command
            .env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "http.extraHeader")
            .env("GIT_CONFIG_VALUE_0", format!("Authorization: Basic {token}"));
        return Ok(None);
    }

    let Some(key) = auth.private_key() else {
        return Ok(None);
    };
    let file = write_private_key(key)?;
    command.env(
        "GIT_SSH_COMMAND",
        format!(
            "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no",
            file.path().display()
        ),
    );
    Ok(Some(file))
}

fn write_private_key(key: &str) -> Result<tempfile::NamedTempFile, GitError> {
    // tempfile creates files with 0600 permissions
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| GitError::Command(format!("failed to create key file: {e}")))?;
    file.write_all(key.as_bytes())
        .and_then(|()| {
            if key.ends_with('\n') {
                Ok(())
            } else {
                file.write_all(b"\n")
            }
        })
        .map_err(|e| GitError::Command(format!("failed to write key file: {e}")))?;
    Ok(file)
}

fn is_auth_failure(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    [
        "authentication failed",
        "authentication required",
        "could not read username",
        "permission denied",
        "invalid username or password",
        "terminal prompts disabled",
    ]
    .iter()
    .any(|needle| stderr.contains(needle))
}

/// Pick the commit of `reference` from `git ls-remote` output
///
/// Branches win over tags. For annotated tags the peeled `^{}` entry points at the commit.
pub fn resolve_reference(ls_remote: &str, reference: &str) -> Option<String> {
    let head = format!("refs/heads/{reference}");
    let tag = format!("refs/tags/{reference}");
    let peeled_tag = format!("{tag}^{{}}");

    let mut tag_commit = None;
    let mut peeled_commit = None;
    for line in ls_remote.lines() {
        let Some((hash, name)) = line.split_once('\t') else {
            continue;
        };
        let name = name.trim();
        if name == head {
            return Some(hash.trim().to_string());
        }
        if name == peeled_tag {
            peeled_commit = Some(hash.trim().to_string());
        } else if name == tag {
            tag_commit = Some(hash.trim().to_string());
        }
    }
    peeled_commit.or(tag_commit)
}

//! # Git Sources
//!
//! Resolves credentials and the latest commit of a git-sourced Function. Lookups go
//! through the async commit checker: the state waits a bounded time for the order and
//! requeues when the commit is not known yet.

use anyhow::Context;
use tokio::time::Instant;
use tracing::{debug, info};

use super::super::fsm::{State, StateMachine, Transition};
use super::super::types::Requeue;
use crate::constants::{
    COMMIT_ORDER_POLL_INTERVAL, CONDITION_CONFIGURATION_READY, CONDITION_FALSE, CONDITION_TRUE,
    REASON_SOURCE_UPDATED, REASON_SOURCE_UPDATE_FAILED, SHORT_REQUEUE,
};
use crate::controller::git::{GitAuth, GitError};
use crate::crd::{GitRepositorySource, RepositoryAuth};

pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let Some(git) = m.state.function.git_source().cloned() else {
        return Transition::Next(State::ConfigurationReady);
    };

    if let Some(auth) = &git.auth {
        match load_git_auth(m, auth).await {
            Ok(git_auth) => m.state.git_auth = Some(git_auth),
            Err(e) => {
                m.state.status.update_condition(
                    CONDITION_CONFIGURATION_READY,
                    CONDITION_FALSE,
                    REASON_SOURCE_UPDATE_FAILED,
                    &format!("Getting git authorization data failed: {e:#}"),
                );
                return Transition::fail(e);
            }
        }
    }

    let commit = match latest_commit(m, &git).await {
        Ok(Some(commit)) => commit,
        Ok(None) => {
            info!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Latest commit of {}@{} not known yet",
                git.url,
                git.reference
            );
            return Transition::Requeue(Requeue::After(SHORT_REQUEUE));
        }
        Err(e) => {
            m.state.status.update_condition(
                CONDITION_CONFIGURATION_READY,
                CONDITION_FALSE,
                REASON_SOURCE_UPDATE_FAILED,
                &source_error_message(&git.url, &e),
            );
            return Transition::fail(anyhow::Error::new(e));
        }
    };

    if m.state.status.commit() != Some(commit.as_str()) {
        m.state.status.update_condition(
            CONDITION_CONFIGURATION_READY,
            CONDITION_TRUE,
            REASON_SOURCE_UPDATED,
            "Function source updated",
        );
    }
    m.state.commit = Some(commit);

    Transition::Next(State::ConfigurationReady)
}

async fn load_git_auth(m: &StateMachine<'_>, auth: &RepositoryAuth) -> anyhow::Result<GitAuth> {
    let secret = m
        .ctx
        .client
        .get_secret(m.namespace(), &auth.secret_name)
        .await?;
    GitAuth::from_secret(&secret, auth)
        .with_context(|| format!("invalid git credentials in secret {}", auth.secret_name))
}

/// Cached commit, or the result of a commit order collected within the configured wait
///
/// `Ok(None)` means the order is still in flight.
async fn latest_commit(
    m: &StateMachine<'_>,
    git: &GitRepositorySource,
) -> Result<Option<String>, GitError> {
    let cache = &m.ctx.commit_cache;
    if !m.state.function.continuous_git_checkout() {
        if let Some(commit) = cache.get(&git.url, &git.reference) {
            debug!("Using cached commit {} of {}@{}", commit, git.url, git.reference);
            return Ok(Some(commit));
        }
    }

    let order_id = commit_order_id(&m.uid(), &git.url, &git.reference);
    let checker = &m.ctx.commit_checker;
    checker.place_order(&order_id, &git.url, &git.reference, m.state.git_auth.clone());

    let deadline = Instant::now() + m.ctx.git_order_wait;
    loop {
        if let Some(order) = checker.collect_order(&order_id) {
            let commit = order.result?;
            cache.set(&git.url, &git.reference, &commit);
            return Ok(Some(commit));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(COMMIT_ORDER_POLL_INTERVAL).await;
    }
}

/// Orders are keyed by source too, so a result for a previous url or reference is never collected
fn commit_order_id(uid: &str, url: &str, reference: &str) -> String {
    format!("{uid}|{url}|{reference}")
}

fn source_error_message(url: &str, error: &GitError) -> String {
    if error.is_auth_error() {
        return format!("Authentication required for Git repository: {url} ");
    }
    format!("Git repository: {url} source check failed: {error}")
}

//! # Reconcile
//!
//! Entry point called by the kube-runtime controller for every Function change.

use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

use super::fsm::StateMachine;
use super::types::{Reconciler, ReconcilerError, Requeue};
use crate::crd::Function;
use crate::observability::ReconcileResult;

/// Run the state machine for one Function and translate its outcome into an [`Action`]
///
/// Functions being deleted are left to garbage collection of their owned objects.
pub async fn reconcile(
    function: Arc<Function>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = function.name_any();
    let namespace = function.namespace().unwrap_or_default();

    if function.metadata.deletion_timestamp.is_some() {
        debug!(
            resource.name = %name,
            resource.namespace = %namespace,
            "Function is being deleted, skipping"
        );
        if let Some(uid) = function.uid() {
            ctx.metrics.forget_function(&uid);
        }
        return Ok(Action::await_change());
    }

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "Function",
        function.runtime = %function.spec.runtime
    );

    ctx.metrics.inc_active_workers();
    let result = StateMachine::new(&ctx, (*function).clone())
        .run()
        .instrument(span)
        .await;
    ctx.metrics.dec_active_workers();

    let (action, reconcile_result) = match result {
        Ok(None) => (Action::await_change(), ReconcileResult::Success),
        Ok(Some(Requeue::Immediate)) => (Action::requeue(Duration::ZERO), ReconcileResult::Requeue),
        Ok(Some(Requeue::After(after))) => (Action::requeue(after), ReconcileResult::RequeueAfter),
        Err(e) => {
            ctx.metrics.record_reconcile_result(ReconcileResult::Error);
            return Err(e);
        }
    };
    ctx.metrics.record_reconcile_result(reconcile_result);
    Ok(action)
}

use super::super::fsm::{State, StateMachine, Transition};

/// Count the reconciliation and start the state-reach timer of the Function
pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let uid = m.uid();
    let runtime = m.state.function.spec.runtime.as_str();
    m.ctx.metrics.record_reconciliation_start(&uid, runtime);
    m.ctx.metrics.start_state_reach_timer(&uid);
    Transition::Next(State::CleanupLegacyServiceAccount)
}

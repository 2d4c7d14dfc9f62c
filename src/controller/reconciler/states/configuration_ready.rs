use super::super::fsm::{State, StateMachine, Transition};
use crate::constants::{CONDITION_CONFIGURATION_READY, CONDITION_TRUE, REASON_FUNCTION_SPEC_VALIDATED};

pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let runtime = &m.state.function.spec.runtime;
    let message = if runtime.is_deprecated() {
        format!(
            "Warning: function configured, runtime {runtime} is deprecated and will be removed in the future"
        )
    } else {
        "Function configured".to_string()
    };

    m.state.status.update_condition(
        CONDITION_CONFIGURATION_READY,
        CONDITION_TRUE,
        REASON_FUNCTION_SPEC_VALIDATED,
        &message,
    );
    m.ctx
        .metrics
        .publish_state_reach_time(&m.uid(), CONDITION_CONFIGURATION_READY);
    Transition::Next(State::HandleDeployment)
}

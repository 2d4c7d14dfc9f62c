use tracing::warn;

use super::super::fsm::{State, StateMachine, Transition};
use super::super::validation::validate_function;
use crate::constants::{CONDITION_CONFIGURATION_READY, CONDITION_FALSE, REASON_INVALID_FUNCTION_SPEC};

/// An invalid Function stops the run until the user changes it
pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let messages = validate_function(&m.state.function);
    if messages.is_empty() {
        return Transition::Next(State::HandleGitSources);
    }

    let message = messages.join(". ");
    warn!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Invalid Function: {}",
        message
    );
    m.state.status.update_condition(
        CONDITION_CONFIGURATION_READY,
        CONDITION_FALSE,
        REASON_INVALID_FUNCTION_SPEC,
        &message,
    );
    Transition::Stop
}

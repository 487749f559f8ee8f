use crate::CoreError;
use std::fmt;

/// States of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Checking,
    Satisfied,
    Building,
    Publishing,
    Done,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileState::Idle => "idle",
            ReconcileState::Checking => "checking",
            ReconcileState::Satisfied => "satisfied",
            ReconcileState::Building => "building",
            ReconcileState::Publishing => "publishing",
            ReconcileState::Done => "done",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: ReconcileState, to: ReconcileState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (ReconcileState::Idle, ReconcileState::Checking)
            | (
                ReconcileState::Checking,
                ReconcileState::Satisfied | ReconcileState::Building
            )
            | (ReconcileState::Building, ReconcileState::Publishing)
            | (ReconcileState::Publishing, ReconcileState::Done)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

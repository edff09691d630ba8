use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: Option<String>, to: String },

    #[error("Task {task} is already in terminal state {state}")]
    AlreadyTerminal { task: String, state: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper to build an invalid-transition error from displayable parts
pub fn invalid_transition(from: impl ToString, event: impl Into<String>) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: Some(from.to_string()),
        to: event.into(),
    }
}

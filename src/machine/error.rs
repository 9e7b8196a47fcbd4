//! Errors reported by state machine operations.

use thiserror::Error;

/// Errors that can occur when configuring, driving or stopping a machine.
///
/// Every failure leaves the machine as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("At least two states are needed for bulk registration, got {count}")]
    TooFewStates { count: usize },

    #[error("State {state} is not registered")]
    UnknownState { state: String },

    #[error("No states registered. Register states before startup")]
    NoStates,

    #[error("No starting state designated. Call set_starting_state() or register_states()")]
    NoStartingState,

    #[error("No state saved. Call save_state() before restore_state()")]
    NothingSaved,

    #[error("Machine already started. States can only be changed before startup")]
    AlreadyStarted,

    #[error("Machine is not running")]
    NotRunning,

    #[error("Startup must be called from within a Tokio runtime")]
    NoRuntime,

    #[error("Tick precision must be greater than zero")]
    InvalidPrecision,

    #[error("Invalid machine configuration: {0}")]
    InvalidConfig(String),

    #[error("Scheduling loop exited before the stop was acknowledged: {reason}")]
    LoopAborted { reason: String },
}

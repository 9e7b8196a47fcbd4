//! Serializable snapshot of a running machine.
//!
//! Lets collaborators such as a heartbeat publisher report where a machine
//! is without reaching into its internals.

use super::{Phase, StateMachine};
use crate::core::StateKey;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Point-in-time status of a state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus<K> {
    /// Diagnostic name of the machine
    pub name: String,

    /// Current state, absent before the first transition
    pub state: Option<K>,

    /// Lifecycle phase
    pub phase: Phase,

    /// Whether tick delivery is paused
    pub paused: bool,

    /// Ticks observed by the current state
    pub ticks: u64,

    /// Report timestamp in milliseconds since the Unix epoch
    pub time: u64,
}

impl<K: StateKey> StateMachine<K> {
    /// Capture the machine's current status.
    pub fn status(&self) -> MachineStatus<K> {
        let state = self.get_state();
        let ticks = state
            .as_ref()
            .and_then(|key| self.tick_count(key))
            .unwrap_or_default();

        MachineStatus {
            name: self.name().to_string(),
            state,
            phase: self.phase(),
            paused: self.is_paused(),
            ticks,
            time: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
        }
    }
}

//! Core state types.
//!
//! This module contains the leaf data of a state machine:
//! - State keys via the `StateKey` trait
//! - The `State` entity with its periodic action
//! - The pure firing rule deciding on which ticks an action runs

mod key;
mod state;

pub use key::StateKey;
pub use state::{fires_on, Action, State, TriggerContext};

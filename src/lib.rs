//! Tickstate: a tick-driven finite state machine engine
//!
//! A process (or one of its sub-resources) models itself as a set of named
//! states. Each state may carry a periodic action that a background task
//! fires on a fixed-precision timer while the state is active. Any task can
//! move the machine between states at any time; shutdown is a two-phase
//! handshake that first waits for the stopping state's action and then for
//! the scheduling task to retire.
//!
//! # Core Concepts
//!
//! - **State**: A key plus an optional action fired every N ticks
//! - **StateMachine**: Owns the states, publishes the active one atomically
//!   and drives the scheduling loop
//! - **Stopping state**: The terminal state whose action unblocks shutdown
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tickstate::{State, StateMachine};
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! enum Service {
//!     Starting,
//!     Servicing,
//!     Stopping,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tickstate::MachineError> {
//! let flushed = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&flushed);
//!
//! let mut machine = StateMachine::new("service", Duration::from_millis(10));
//! machine.register_states(vec![
//!     State::new(Service::Starting),
//!     State::new(Service::Servicing).every(5).with_action(|_| {}),
//!     State::new(Service::Stopping).with_action(move |_| {
//!         flag.store(true, Ordering::SeqCst);
//!     }),
//! ])?;
//!
//! machine.startup()?;
//! machine.move_to_state(&Service::Servicing)?;
//! machine.shutdown().await?;
//!
//! assert!(flushed.load(Ordering::SeqCst));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod logging;
pub mod machine;

// Re-export commonly used types
pub use config::MachineConfig;
pub use crate::core::{State, StateKey};
pub use machine::{MachineError, MachineStatus, Phase, StateMachine};

//! Tick-driven state machine.
//!
//! A `StateMachine` owns a table of states, publishes the active one
//! atomically, and runs a background task that triggers the active state on
//! every tick of a fixed-precision timer.
//!
//! # Lifecycle
//!
//! 1. Construct with [`StateMachine::new`] or [`StateMachine::from_config`]
//! 2. Register states (`&mut self`, before startup only)
//! 3. [`StateMachine::startup`] spawns the scheduling loop
//! 4. Move between states from any task with [`StateMachine::move_to_state`]
//! 5. [`StateMachine::shutdown`] waits for the stopping state's action and
//!    retires the loop; the machine cannot be started again
//!
//! Transitions are flat: any registered state can be reached from any other
//! and concurrent movers race with last-writer-wins semantics.

mod error;
mod latch;
mod lifecycle;
mod status;

pub use error::MachineError;
pub use lifecycle::Phase;
pub use status::MachineStatus;

use crate::config::MachineConfig;
use crate::core::{State, StateKey, TriggerContext};
use latch::StopLatch;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Slot value meaning "no state".
const NO_SLOT: usize = usize::MAX;

/// State shared between the machine handle and its scheduling task.
///
/// The table fields are only written through `Arc::get_mut` while the
/// machine is idle; once the loop holds a clone they are read-only.
pub(crate) struct Shared<K: StateKey> {
    name: String,
    precision: Duration,
    states: Vec<State<K>>,
    slots: HashMap<K, usize>,
    starting: Option<usize>,
    stopping: Option<usize>,

    current: AtomicUsize,
    saved: AtomicUsize,
    trace: AtomicBool,
    phase: AtomicU8,
    paused: watch::Sender<bool>,
    stop_ack: StopLatch,
    quit: CancellationToken,
}

impl<K: StateKey> Shared<K> {
    fn key_at(&self, slot: usize) -> Option<&K> {
        self.states.get(slot).map(State::name)
    }

    fn slot_of(&self, key: &K) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Publish `slot` as the current state. Returns `false` if it already was.
    fn move_to(&self, slot: usize) -> bool {
        let previous = self.current.load(Ordering::Acquire);
        if previous == slot {
            trace!(machine = %self.name, state = ?self.key_at(slot), "already in state");
            return false;
        }

        if self.trace.load(Ordering::Relaxed) {
            debug!(
                machine = %self.name,
                from = ?self.key_at(previous),
                to = ?self.key_at(slot),
                "move state"
            );
        }

        self.current.store(slot, Ordering::Release);
        true
    }

    /// Trigger the state active at call time.
    ///
    /// Releases the stop latch when the stopping state fires. Returns `true`
    /// only for the trigger that released it; ticks keep being dispatched
    /// either way until the loop is told to quit.
    fn trigger_current(&self) -> bool {
        let slot = self.current.load(Ordering::Acquire);
        let Some(state) = self.states.get(slot) else {
            return false;
        };

        let ctx = TriggerContext {
            machine: &self.name,
            trace: self.trace.load(Ordering::Relaxed),
        };

        if !state.trigger(ctx) || self.stopping != Some(slot) {
            return false;
        }

        let released = self.stop_ack.release();
        if released {
            debug!(machine = %self.name, "stop acknowledged");
        }
        released
    }

    fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

/// A tick-driven finite state machine keyed by `K`.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tickstate::{State, StateMachine};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tickstate::MachineError> {
/// let polls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&polls);
///
/// let mut machine = StateMachine::new("poller", Duration::from_millis(10));
/// machine.register_states(vec![
///     State::new("poll").with_action(move |_| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
///     State::new("stop").with_action(|_| {}),
/// ])?;
///
/// machine.startup()?;
/// assert_eq!(machine.get_state(), Some("poll"));
///
/// tokio::time::sleep(Duration::from_millis(30)).await;
/// machine.shutdown().await?;
/// assert!(polls.load(Ordering::SeqCst) > 0);
/// # Ok(())
/// # }
/// ```
pub struct StateMachine<K: StateKey> {
    shared: Arc<Shared<K>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<K: StateKey> StateMachine<K> {
    /// Create an empty machine ticking every `precision`.
    pub fn new(name: impl Into<String>, precision: Duration) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                precision,
                states: Vec::new(),
                slots: HashMap::new(),
                starting: None,
                stopping: None,
                current: AtomicUsize::new(NO_SLOT),
                saved: AtomicUsize::new(NO_SLOT),
                trace: AtomicBool::new(false),
                phase: AtomicU8::new(Phase::Idle as u8),
                paused,
                stop_ack: StopLatch::new(),
                quit: CancellationToken::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Create an empty machine from a validated configuration.
    pub fn from_config(config: &MachineConfig) -> Result<Self, MachineError> {
        config.validate()?;
        let machine = Self::new(config.name.clone(), config.precision());
        machine.enable_state_trace(config.trace);
        Ok(machine)
    }

    /// Diagnostic name used in every log line.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Time between scheduler ticks.
    pub fn precision(&self) -> Duration {
        self.shared.precision
    }

    /// Number of registered states.
    pub fn state_count(&self) -> usize {
        self.shared.states.len()
    }

    /// Ticks observed so far by the state registered under `key`.
    pub fn tick_count(&self, key: &K) -> Option<u64> {
        self.shared
            .slot_of(key)
            .map(|slot| self.shared.states[slot].tick_count())
    }

    /// Key of the state entered on startup, if designated.
    pub fn starting_state(&self) -> Option<K> {
        self.shared
            .starting
            .and_then(|slot| self.shared.key_at(slot))
            .cloned()
    }

    /// Key of the terminal state that unblocks shutdown, if designated.
    pub fn stopping_state(&self) -> Option<K> {
        self.shared
            .stopping
            .and_then(|slot| self.shared.key_at(slot))
            .cloned()
    }

    /// Enable or disable verbose transition and trigger logging.
    ///
    /// Disabled by default.
    pub fn enable_state_trace(&self, on: bool) {
        self.shared.trace.store(on, Ordering::Relaxed);
    }

    /// Whether verbose transition and trigger logging is on.
    pub fn is_trace_enabled(&self) -> bool {
        self.shared.trace.load(Ordering::Relaxed)
    }

    /// Mutable access to the state table, only while the machine is idle.
    fn table(&mut self) -> Result<&mut Shared<K>, MachineError> {
        if self.shared.phase() != Phase::Idle {
            error!(machine = %self.shared.name, "machine already started, states are frozen");
            return Err(MachineError::AlreadyStarted);
        }

        // Only the scheduling task clones the Arc, and it does not exist while idle.
        Arc::get_mut(&mut self.shared).ok_or(MachineError::AlreadyStarted)
    }

    /// Register a state, replacing any state registered under the same key.
    ///
    /// The state's tick counter restarts from 0.
    pub fn register_state(&mut self, state: State<K>) -> Result<(), MachineError> {
        let table = self.table()?;

        state.reset_ticks();
        let key = state.name().clone();
        match table.slot_of(&key) {
            Some(slot) => table.states[slot] = state,
            None => {
                table.slots.insert(key.clone(), table.states.len());
                table.states.push(state);
            }
        }

        debug!(machine = %table.name, state = ?key, "register state");
        Ok(())
    }

    /// Register an ordered list of at least two states.
    ///
    /// The first state becomes the starting state and the last one the
    /// stopping state. States are registered one at a time; a failure part
    /// way through keeps the ones already registered.
    pub fn register_states(&mut self, states: Vec<State<K>>) -> Result<(), MachineError> {
        if states.len() < 2 {
            error!(
                machine = %self.shared.name,
                count = states.len(),
                "at least two states are needed"
            );
            return Err(MachineError::TooFewStates {
                count: states.len(),
            });
        }

        let first = states[0].name().clone();
        let last = states[states.len() - 1].name().clone();

        for state in states {
            self.register_state(state)?;
        }

        self.set_starting_state(&first)?;
        self.set_stopping_state(&last)
    }

    /// Designate the state the machine enters on startup.
    pub fn set_starting_state(&mut self, key: &K) -> Result<(), MachineError> {
        let table = self.table()?;
        let Some(slot) = table.slot_of(key) else {
            error!(machine = %table.name, state = ?key, "starting state is not registered");
            return Err(unknown(key));
        };

        table.starting = Some(slot);
        Ok(())
    }

    /// Designate the terminal state whose action unblocks shutdown.
    pub fn set_stopping_state(&mut self, key: &K) -> Result<(), MachineError> {
        let table = self.table()?;
        let Some(slot) = table.slot_of(key) else {
            error!(machine = %table.name, state = ?key, "stopping state is not registered");
            return Err(unknown(key));
        };

        table.stopping = Some(slot);
        Ok(())
    }

    /// The current state, or `None` before any state has been entered.
    ///
    /// Never blocks and is safe to call from any task.
    pub fn get_state(&self) -> Option<K> {
        let slot = self.shared.current.load(Ordering::Acquire);
        self.shared.key_at(slot).cloned()
    }

    /// Make `key` the current state.
    ///
    /// Moving to the current state is a successful no-op. Safe to call
    /// concurrently with the scheduling loop and other movers; the last
    /// store wins.
    pub fn move_to_state(&self, key: &K) -> Result<(), MachineError> {
        let Some(slot) = self.shared.slot_of(key) else {
            error!(machine = %self.shared.name, state = ?key, "state not found");
            return Err(unknown(key));
        };

        self.shared.move_to(slot);
        Ok(())
    }

    /// Remember the current state for a later [`restore_state`](Self::restore_state).
    ///
    /// Not meant to race with `move_to_state`: the saved value is whichever
    /// state was current when the load happened.
    pub fn save_state(&self) {
        let slot = self.shared.current.load(Ordering::Acquire);
        self.shared.saved.store(slot, Ordering::Release);
    }

    /// Move back to the state remembered by the latest `save_state`.
    pub fn restore_state(&self) -> Result<(), MachineError> {
        let slot = self.shared.saved.load(Ordering::Acquire);
        let Some(key) = self.shared.key_at(slot) else {
            error!(machine = %self.shared.name, "no saved state to restore");
            return Err(MachineError::NothingSaved);
        };

        self.move_to_state(key)
    }
}

impl<K: StateKey> Drop for StateMachine<K> {
    fn drop(&mut self) {
        self.shared.quit.cancel();
    }
}

fn unknown<K: StateKey>(key: &K) -> MachineError {
    MachineError::UnknownState {
        state: format!("{key:?}"),
    }
}

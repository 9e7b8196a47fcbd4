//! State entity and its tick-driven trigger.
//!
//! A state pairs a key with an optional periodic action. Every scheduler
//! tick spent in the state advances its tick counter; the action fires when
//! the counter lands on a multiple of the state's interval.

use super::key::StateKey;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Callable bound to a state, invoked with the state's arguments.
pub type Action = Arc<dyn Fn(&Value) + Send + Sync>;

/// Tick counts at which the every-Nth-firing trace line is emitted.
const TRACE_EVERY: u64 = 5;

/// Whether a firing on `tick` emits the low-frequency trace line.
///
/// Independent of the firing interval: only the raw tick count matters.
fn traces_on(trace: bool, tick: u64) -> bool {
    trace && tick % TRACE_EVERY == 0
}

/// Pure firing rule shared by every state.
///
/// An interval of 0 fires on every tick, an interval of N fires on ticks
/// N, 2N, 3N, and so on.
///
/// # Example
///
/// ```rust
/// use tickstate::core::fires_on;
///
/// assert!(fires_on(0, 1));
/// assert!(fires_on(3, 6));
/// assert!(!fires_on(3, 7));
/// ```
pub fn fires_on(interval: u64, tick: u64) -> bool {
    interval == 0 || tick % interval == 0
}

/// Machine-side information a state needs while being triggered.
///
/// Borrowed from the owning machine for the duration of one trigger, so a
/// state never holds a reference back to its machine.
#[derive(Clone, Copy, Debug)]
pub struct TriggerContext<'a> {
    pub machine: &'a str,
    pub trace: bool,
}

/// A named node of a state machine.
///
/// # Example
///
/// ```rust
/// use tickstate::core::State;
/// use serde_json::json;
///
/// let state = State::new("report")
///     .every(10)
///     .with_args(json!({"topic": "status"}))
///     .with_action(|args| {
///         let _topic = &args["topic"];
///     });
///
/// assert_eq!(state.name(), &"report");
/// assert_eq!(state.tick_interval(), 10);
/// assert!(state.has_action());
/// ```
pub struct State<K: StateKey> {
    name: K,
    tick_interval: u64,
    action: Option<Action>,
    args: Value,
    tick_count: AtomicU64,
}

impl<K: StateKey> State<K> {
    /// Create a state that fires on every tick and has no action yet.
    pub fn new(name: K) -> Self {
        Self {
            name,
            tick_interval: 0,
            action: None,
            args: Value::Null,
            tick_count: AtomicU64::new(0),
        }
    }

    /// Fire the action only on every `ticks`-th tick; 0 means every tick.
    pub fn every(mut self, ticks: u64) -> Self {
        self.tick_interval = ticks;
        self
    }

    /// Bind the action invoked when the firing condition is met.
    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Set the opaque payload passed to the action.
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn name(&self) -> &K {
        &self.name
    }

    pub fn tick_interval(&self) -> u64 {
        self.tick_interval
    }

    pub fn args(&self) -> &Value {
        &self.args
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// Ticks observed since the state was registered.
    ///
    /// Not reset when the machine re-enters the state: a revisited state
    /// resumes counting where it left off.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_ticks(&self) {
        self.tick_count.store(0, Ordering::Relaxed);
    }

    /// Advance the tick counter and run the action if it is due.
    ///
    /// Returns whether the firing condition was met, whether or not an
    /// action is bound. Only the scheduling task calls this.
    pub(crate) fn trigger(&self, ctx: TriggerContext<'_>) -> bool {
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if !fires_on(self.tick_interval, tick) {
            return false;
        }

        if let Some(action) = &self.action {
            if traces_on(ctx.trace, tick) {
                debug!(machine = %ctx.machine, state = ?self.name, tick, "trigger action");
            }

            action(&self.args);
        }

        true
    }
}

impl<K: StateKey> fmt::Debug for State<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("tick_interval", &self.tick_interval)
            .field("has_action", &self.has_action())
            .field("args", &self.args)
            .field("tick_count", &self.tick_count())
            .finish()
    }
}

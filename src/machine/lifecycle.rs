//! Startup, shutdown and the scheduling loop.

use super::{MachineError, Shared, StateMachine};
use crate::core::StateKey;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Lifecycle phase of a machine.
///
/// Phases only move forward: `Idle -> Running -> Stopping -> Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Phase {
    /// Constructed, states may still be registered
    Idle = 0,
    /// Scheduling loop is running
    Running = 1,
    /// Shutdown is waiting for the stop handshake
    Stopping = 2,
    /// Loop retired; the machine cannot be restarted
    Stopped = 3,
}

impl Phase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl<K: StateKey> StateMachine<K> {
    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Start the machine.
    ///
    /// Moves to the starting state and spawns the scheduling loop on the
    /// current Tokio runtime, then returns without waiting for any tick.
    /// The starting state is triggered once right away.
    pub fn startup(&self) -> Result<(), MachineError> {
        let shared = &self.shared;

        if shared.states.is_empty() {
            error!(machine = %shared.name, "no states registered, cannot startup");
            return Err(MachineError::NoStates);
        }

        let Some(starting) = shared.starting else {
            error!(machine = %shared.name, "no starting state designated, cannot startup");
            return Err(MachineError::NoStartingState);
        };

        if shared.precision.is_zero() {
            error!(machine = %shared.name, "tick precision is zero, cannot startup");
            return Err(MachineError::InvalidPrecision);
        }

        let Ok(runtime) = Handle::try_current() else {
            error!(machine = %shared.name, "startup called outside of a tokio runtime");
            return Err(MachineError::NoRuntime);
        };

        if shared
            .phase
            .compare_exchange(
                Phase::Idle as u8,
                Phase::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            error!(machine = %shared.name, phase = ?shared.phase(), "machine already started");
            return Err(MachineError::AlreadyStarted);
        }

        shared.move_to(starting);

        let worker = runtime.spawn(run_loop(Arc::clone(shared)));
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);

        info!(machine = %shared.name, precision = ?shared.precision, "state machine started");
        Ok(())
    }

    /// Stop the machine.
    ///
    /// Moves to the stopping state and waits until its action has run, then
    /// signals the loop to quit and waits for it to exit. A paused timer is
    /// resumed first so the stopping state gets its tick.
    pub async fn shutdown(&self) -> Result<(), MachineError> {
        let shared = &self.shared;

        if shared
            .phase
            .compare_exchange(
                Phase::Running as u8,
                Phase::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            error!(machine = %shared.name, phase = ?shared.phase(), "machine is not running");
            return Err(MachineError::NotRunning);
        }

        info!(machine = %shared.name, "state machine is exiting");

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut worker) = worker else {
            shared.phase.store(Phase::Stopped as u8, Ordering::Release);
            return Err(MachineError::NotRunning);
        };

        if shared.paused.send_replace(false) {
            debug!(machine = %shared.name, "resuming paused timer for shutdown");
        }

        match shared.stopping {
            Some(stopping) => {
                shared.move_to(stopping);
                tokio::select! {
                    () = shared.stop_ack.wait() => {}
                    joined = &mut worker => {
                        return Err(abort(shared, joined));
                    }
                }
            }
            None => {
                warn!(machine = %shared.name, "no stopping state designated, skipping stop handshake");
            }
        }

        shared.quit.cancel();
        if let Err(err) = worker.await {
            return Err(abort(shared, Err(err)));
        }

        shared.phase.store(Phase::Stopped as u8, Ordering::Release);
        info!(machine = %shared.name, "state machine exited");
        Ok(())
    }

    /// Stop delivering ticks until [`resume`](Self::resume) is called.
    ///
    /// Shutdown still works while paused.
    pub fn pause(&self) {
        if !self.shared.paused.send_replace(true) {
            debug!(machine = %self.shared.name, "timer paused");
        }
    }

    /// Resume tick delivery; the next tick is one full period away.
    pub fn resume(&self) {
        if self.shared.paused.send_replace(false) {
            debug!(machine = %self.shared.name, "timer resumed");
        }
    }

    /// Whether tick delivery is paused.
    pub fn is_paused(&self) -> bool {
        *self.shared.paused.borrow()
    }
}

fn abort<K: StateKey>(shared: &Shared<K>, joined: Result<(), JoinError>) -> MachineError {
    shared.phase.store(Phase::Stopped as u8, Ordering::Release);
    let reason = match joined {
        Ok(()) => "loop exited early".to_string(),
        Err(err) => err.to_string(),
    };
    error!(machine = %shared.name, %reason, "scheduling loop aborted");
    MachineError::LoopAborted { reason }
}

/// Body of the scheduling task.
///
/// Triggers the current state once, then on every tick until the quit
/// signal arrives.
async fn run_loop<K: StateKey>(shared: Arc<Shared<K>>) {
    let mut paused = shared.paused.subscribe();
    let mut ticker = interval_at(Instant::now() + shared.precision, shared.precision);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    shared.trigger_current();

    loop {
        let is_paused = *paused.borrow_and_update();

        tokio::select! {
            biased;

            () = shared.quit.cancelled() => break,
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                if !*paused.borrow_and_update() {
                    ticker.reset();
                }
            }
            _ = ticker.tick(), if !is_paused => {
                shared.trigger_current();
            }
        }
    }

    info!(machine = %shared.name, "state machine loop quit");
}

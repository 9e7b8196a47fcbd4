//! Machine configuration.
//!
//! Lets a machine's name, tick precision and trace toggle come from a
//! config file instead of code.

use crate::machine::MachineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tick precision used when none is configured.
pub const DEFAULT_PRECISION_MS: u64 = 100;

fn default_precision_ms() -> u64 {
    DEFAULT_PRECISION_MS
}

/// Configuration of a single state machine.
///
/// # Example
///
/// ```rust
/// use tickstate::config::MachineConfig;
/// use std::time::Duration;
///
/// let config: MachineConfig =
///     serde_json::from_str(r#"{"name": "registerer", "precision_ms": 250}"#).unwrap();
///
/// assert_eq!(config.precision(), Duration::from_millis(250));
/// assert!(!config.trace);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Diagnostic name used in every log line
    pub name: String,

    /// Milliseconds between scheduler ticks
    #[serde(default = "default_precision_ms")]
    pub precision_ms: u64,

    /// Verbose transition and trigger logging
    #[serde(default)]
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "state-machine".to_string(),
            precision_ms: DEFAULT_PRECISION_MS,
            trace: false,
        }
    }
}

impl MachineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_precision(mut self, precision: Duration) -> Self {
        self.precision_ms = u64::try_from(precision.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn precision(&self) -> Duration {
        Duration::from_millis(self.precision_ms)
    }

    pub fn validate(&self) -> Result<(), MachineError> {
        if self.name.trim().is_empty() {
            return Err(MachineError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }

        if self.precision_ms == 0 {
            return Err(MachineError::InvalidConfig(
                "precision_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

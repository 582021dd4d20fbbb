//! Autosave runtime configuration.
//!
//! Timing is resolved once at process startup and then passed into each editing session.
//! Sessions never read process-wide environment variables themselves, which keeps behaviour
//! identical across the binary and test harnesses.

use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_FAILED_DISPLAY_MS, DEFAULT_SAVED_DISPLAY_MS};
use crate::{AutosaveError, AutosaveResult};
use std::time::Duration;

/// Timing configuration shared by every autosave session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutosaveConfig {
    debounce: Duration,
    saved_display: Duration,
    failed_display: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            saved_display: Duration::from_millis(DEFAULT_SAVED_DISPLAY_MS),
            failed_display: Duration::from_millis(DEFAULT_FAILED_DISPLAY_MS),
        }
    }
}

impl AutosaveConfig {
    /// Create a new `AutosaveConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`AutosaveError::InvalidConfig`] if `debounce` is zero; a zero window would turn
    /// every keystroke into a write.
    pub fn new(
        debounce: Duration,
        saved_display: Duration,
        failed_display: Duration,
    ) -> AutosaveResult<Self> {
        if debounce.is_zero() {
            return Err(AutosaveError::InvalidConfig(
                "debounce window must be greater than zero".into(),
            ));
        }

        Ok(Self {
            debounce,
            saved_display,
            failed_display,
        })
    }

    /// Build a config from optional millisecond strings, typically read from the environment.
    ///
    /// `None`, empty or whitespace-only values fall back to the defaults.
    pub fn from_env_values(
        debounce_ms: Option<String>,
        saved_display_ms: Option<String>,
        failed_display_ms: Option<String>,
    ) -> AutosaveResult<Self> {
        Self::new(
            millis_or_default("debounce", debounce_ms, DEFAULT_DEBOUNCE_MS)?,
            millis_or_default("saved display", saved_display_ms, DEFAULT_SAVED_DISPLAY_MS)?,
            millis_or_default(
                "failed display",
                failed_display_ms,
                DEFAULT_FAILED_DISPLAY_MS,
            )?,
        )
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn saved_display(&self) -> Duration {
        self.saved_display
    }

    pub fn failed_display(&self) -> Duration {
        self.failed_display
    }
}

fn millis_or_default(name: &str, value: Option<String>, default: u64) -> AutosaveResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let millis = match value {
        Some(v) => v.parse::<u64>().map_err(|e| {
            AutosaveError::InvalidConfig(format!("{name} must be a whole number of ms: {e}"))
        })?,
        None => default,
    };

    Ok(Duration::from_millis(millis))
}

//! The save status a UI renders next to an editor.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Save scheduler state, projected for display.
///
/// `Saved` and `Failed` are transient: the scheduler reverts them to `Idle` after a display
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    /// A change is pending but the document is not save-worthy yet.
    Waiting,
    /// A change is pending and the quiescence window is running.
    Debouncing,
    /// A persistence call is in flight.
    Saving,
    Saved,
    Failed,
}

impl SaveStatus {
    pub fn label(self) -> &'static str {
        match self {
            SaveStatus::Idle => "",
            SaveStatus::Waiting => "Waiting for required fields",
            SaveStatus::Debouncing => "Unsaved changes",
            SaveStatus::Saving => "Auto-saving...",
            SaveStatus::Saved => "Auto-saved",
            SaveStatus::Failed => "Auto-save failed",
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(self, SaveStatus::Saved | SaveStatus::Failed)
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Publishes status changes to any number of readers.
#[derive(Debug)]
pub(crate) struct StatusSignal {
    tx: watch::Sender<SaveStatus>,
}

impl StatusSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SaveStatus::Idle);
        Self { tx }
    }

    pub(crate) fn get(&self) -> SaveStatus {
        *self.tx.borrow()
    }

    /// Publish `status`, even when nobody is subscribed.
    pub(crate) fn set(&self, status: SaveStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(SaveStatus::Saving.label(), "Auto-saving...");
        assert_eq!(SaveStatus::Saved.to_string(), "Auto-saved");
        assert_eq!(SaveStatus::Failed.label(), "Auto-save failed");
        assert_eq!(SaveStatus::Idle.label(), "");
    }

    #[test]
    fn test_only_outcomes_are_transient() {
        assert!(SaveStatus::Saved.is_transient());
        assert!(SaveStatus::Failed.is_transient());
        assert!(!SaveStatus::Waiting.is_transient());
        assert!(!SaveStatus::Saving.is_transient());
    }

    #[test]
    fn test_signal_updates_without_subscribers() {
        let signal = StatusSignal::new();
        signal.set(SaveStatus::Debouncing);
        assert_eq!(signal.get(), SaveStatus::Debouncing);
    }

    #[test]
    fn test_subscriber_sees_changes_but_not_repeats() {
        let signal = StatusSignal::new();
        let mut rx = signal.subscribe();

        signal.set(SaveStatus::Saving);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Saving);

        signal.set(SaveStatus::Saving);
        assert!(!rx.has_changed().unwrap());
    }
}

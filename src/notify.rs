//! Notification sink for non-fatal diagnostics.
//!
//! The sync core never prints or logs warnings on its own; every validator
//! and orchestrator is handed a [`Notifier`] and reports through it. The
//! binary wires in [`LogNotifier`], tests and embedding applications can use
//! [`MemoryNotifier`] to inspect what was reported.

use std::sync::Mutex;

/// Receives warnings and errors from the sync core.
pub trait Notifier: Send + Sync {
    /// A non-fatal problem, e.g. a hash mismatch that will trigger a re-copy.
    fn warning(&self, message: &str);

    /// A problem the caller should surface to the user.
    fn error(&self, message: &str);
}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Severity of a recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Sent through [`Notifier::warning`]
    Warning,
    /// Sent through [`Notifier::error`]
    Error,
}

/// Collects notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemoryNotifier {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded warnings, oldest first.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.filtered(Level::Warning)
    }

    /// All recorded errors, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.filtered(Level::Error)
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn filtered(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Notifier for MemoryNotifier {
    fn warning(&self, message: &str) {
        self.lock().push((Level::Warning, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lock().push((Level::Error, message.to_string()));
    }
}

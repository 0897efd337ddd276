//! Fire-and-forget status notifications for front-ends.

use std::fmt;
use std::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Informational,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Informational => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// A banner-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Sending half of the status channel. Posting never blocks and never fails;
/// messages are dropped if nobody listens.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    sender: mpsc::Sender<StatusMessage>,
}

impl StatusNotifier {
    /// Create a notifier and the receiver the front-end drains.
    pub fn channel() -> (Self, mpsc::Receiver<StatusMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    pub fn post(&self, severity: Severity, title: impl Into<String>, message: impl Into<String>) {
        let status = StatusMessage {
            severity,
            title: title.into(),
            message: message.into(),
        };
        if self.sender.send(status).is_err() {
            trace!("Status receiver dropped, message discarded");
        }
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.post(Severity::Informational, title, message);
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.post(Severity::Success, title, message);
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) {
        self.post(Severity::Warning, title, message);
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.post(Severity::Error, title, message);
    }
}

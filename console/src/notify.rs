//! User-facing notifications.
//!
//! Components report outcomes through a [`Notifier`]; whoever owns the
//! matching receiver decides how to show them (the CLI prints to stderr).
//! Every notification is also logged.

use tokio::sync::mpsc;

/// Generic text shown for any transport failure.
pub const CONNECTIVITY_MESSAGE: &str = "something went wrong while connecting to api server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.message)
    }
}

/// Sending half of the notification channel.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

/// Create a notifier and the receiver its notifications arrive on.
pub fn channel() -> (Notifier, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, rx)
}

impl Notifier {
    pub fn notify(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::error!(%message, "notify"),
            Severity::Warning => tracing::warn!(%message, "notify"),
            Severity::Success | Severity::Info => tracing::info!(%message, "notify"),
        }
        // A closed receiver means nobody is watching; the log line remains.
        let _ = self.tx.send(Notification { severity, message });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Severity::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Severity::Error, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Severity::Warning, message);
    }
}

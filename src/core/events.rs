//! Status channel between the workspace engine and whatever renders it.

use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A scan finished and the list was rebuilt (possibly empty).
    ListReplaced { count: usize },
    /// Fields of one entry changed in place.
    RepositoryUpdated { path: PathBuf },
    Notice(Notification),
}

pub type EventReceiver = mpsc::UnboundedReceiver<WorkspaceEvent>;

/// Cloneable sending side. Every notice is also written to the log.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkspaceEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: WorkspaceEvent) {
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
        self.emit(WorkspaceEvent::Notice(Notification { severity, message }));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.notify(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Severity::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_delivers_notice() {
        let (sink, mut rx) = EventSink::channel();
        sink.warn("repoA: fetch from origin failed");

        match rx.try_recv() {
            Ok(WorkspaceEvent::Notice(notice)) => {
                assert_eq!(notice.severity, Severity::Warning);
                assert_eq!(notice.to_string(), "repoA: fetch from origin failed");
            }
            other => panic!("Expected a notice, got: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_receiver_does_not_panic() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(WorkspaceEvent::ListReplaced { count: 0 });
        sink.error("still fine");
    }
}

//! Notification sink for user-visible success and error messages
//!
//! Notifications are fire-and-forget: the session never looks at what a sink
//! does with them. The console sink writes either plain lines or JSON lines
//! to stderr, one message per line.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

impl NotificationLevel {
    /// Get string representation of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "error",
        }
    }
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Accepts notifications for display
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: String) {
        self.notify(Notification::success(message));
    }

    fn error(&self, message: String) {
        self.notify(Notification::error(message));
    }
}

/// Notification line written to stderr in JSON mode
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    /// Message type identifier ("n" for notification)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since notifier creation
    pub ts: u64,
    /// Severity
    pub level: NotificationLevel,
    /// Message text
    pub message: String,
}

impl NotificationMessage {
    /// Create a new notification message
    pub fn new(seq: u64, ts: u64, level: NotificationLevel, message: String) -> Self {
        Self {
            msg_type: "n",
            seq,
            ts,
            level,
            message,
        }
    }
}

/// Writes notifications to stderr
pub struct ConsoleNotifier {
    /// Emit JSON lines instead of plain text
    json: bool,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Creation time of the notifier
    start_time: Instant,
}

impl ConsoleNotifier {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Build the JSON message for a notification
    pub fn message_for(&self, notification: &Notification) -> NotificationMessage {
        NotificationMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            notification.level,
            notification.message.clone(),
        )
    }

    /// Render a plain-text line for a notification
    pub fn plain_line(notification: &Notification) -> String {
        let tag = match notification.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Error => "error",
        };
        format!("[{}] {}", tag, notification.message)
    }

    fn output_to_stderr(&self, line: &str) {
        eprintln!("{}", line);
        std::io::stderr().flush().ok();
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        log::debug!(
            "notification ({}): {}",
            notification.level.as_str(),
            notification.message
        );
        if self.json {
            if let Ok(json) = serde_json::to_string(&self.message_for(&notification)) {
                self.output_to_stderr(&json);
            }
        } else {
            self.output_to_stderr(&Self::plain_line(&notification));
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications in arrival order
    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Error messages in arrival order
    pub fn errors(&self) -> Vec<String> {
        self.messages(NotificationLevel::Error)
    }

    /// Success messages in arrival order
    pub fn successes(&self) -> Vec<String> {
        self.messages(NotificationLevel::Success)
    }

    fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

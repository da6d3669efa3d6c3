//! Copy-to-clipboard with transient feedback

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ScanError;
use crate::notify::Notifier;

/// Something text can be copied into
pub trait Clipboard: Send {
    fn write_text(&mut self, text: &str) -> Result<(), ScanError>;
}

/// Sets the terminal's clipboard through an OSC 52 escape sequence
pub struct TerminalClipboard<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalClipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// The escape sequence that puts `text` on the clipboard
    pub fn sequence(text: &str) -> String {
        format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
    }
}

impl TerminalClipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Clipboard for TerminalClipboard<W> {
    fn write_text(&mut self, text: &str) -> Result<(), ScanError> {
        self.out
            .write_all(Self::sequence(text).as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ScanError::clipboard(e.to_string()))
    }
}

/// The copy action shown next to a result
pub struct CopyButton<C: Clipboard> {
    clipboard: C,
    notifier: Arc<dyn Notifier>,
    reset_after: Duration,
    copied_at: Option<Instant>,
}

impl<C: Clipboard> CopyButton<C> {
    pub fn new(clipboard: C, notifier: Arc<dyn Notifier>, reset_after: Duration) -> Self {
        Self {
            clipboard,
            notifier,
            reset_after,
            copied_at: None,
        }
    }

    /// Copy `text`; returns whether it reached the clipboard
    pub fn copy(&mut self, text: &str) -> bool {
        match self.clipboard.write_text(text) {
            Ok(()) => {
                self.copied_at = Some(Instant::now());
                self.notifier.success("Copied".to_string());
                true
            }
            Err(e) => {
                log::error!("Failed to copy text: {}", e);
                false
            }
        }
    }

    /// Whether the "Copied" state is still showing
    pub fn is_copied(&self) -> bool {
        self.copied_at
            .is_some_and(|at| at.elapsed() < self.reset_after)
    }

    pub fn label(&self) -> &'static str {
        if self.is_copied() {
            "Copied"
        } else {
            "Copy to clipboard"
        }
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }
}

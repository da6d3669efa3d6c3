//! Scan mode state machine
//!
//! Pure transitions only; the session applies them and a rendering layer
//! reads the resulting mode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which part of the scanner is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Nothing in progress
    #[default]
    Idle,
    /// The mode-selection surface is open
    AwaitingChoice,
    /// The camera is capturing frames
    CameraActive,
    /// A file batch is being decoded
    FileProcessing,
}

impl ScanMode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Idle => "idle",
            ScanMode::AwaitingChoice => "awaiting_choice",
            ScanMode::CameraActive => "camera_active",
            ScanMode::FileProcessing => "file_processing",
        }
    }

    /// Whether the session is busy with a capture or a batch
    pub fn is_busy(&self) -> bool {
        matches!(self, ScanMode::CameraActive | ScanMode::FileProcessing)
    }

    /// Apply an event, returning the next mode
    pub fn on(self, event: ModeEvent) -> Result<ScanMode, TransitionError> {
        use ModeEvent::*;
        use ScanMode::*;

        let next = match (self, event) {
            (_, EngineFailed) => Idle,
            (Idle, OpenChoice) => AwaitingChoice,
            (AwaitingChoice, DismissChoice) => Idle,
            (AwaitingChoice, SelectionEmpty) => Idle,
            (Idle | AwaitingChoice, CameraStarted) => CameraActive,
            (Idle | AwaitingChoice, FilesSelected) => FileProcessing,
            (CameraActive, ScanSucceeded | Cancelled | CameraFailed) => Idle,
            (FileProcessing, BatchFinished) => Idle,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs that drive the mode machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeEvent {
    /// The user opened the mode-selection surface
    OpenChoice,
    /// The user closed the mode-selection surface
    DismissChoice,
    /// Camera capture resolved successfully
    CameraStarted,
    /// Camera capture failed or the stream died
    CameraFailed,
    /// A decoded frame ended the capture
    ScanSucceeded,
    /// The user cancelled the capture
    Cancelled,
    /// The file selection returned files
    FilesSelected,
    /// The file selection returned nothing
    SelectionEmpty,
    /// The file queue is exhausted
    BatchFinished,
    /// The engine failed unrecoverably
    EngineFailed,
}

/// An event that is not valid in the current mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} in mode {from}")]
pub struct TransitionError {
    pub from: ScanMode,
    pub event: ModeEvent,
}

//! Error types for scan sessions

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur during a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// The decoding engine could not be bound to the visual surface
    EngineInit,
    /// The camera could not be acquired (permission, hardware, missing source)
    CameraAcquisition,
    /// No code could be decoded from an image
    DecodeFailed,
    /// A selected file does not claim an image content type
    UnsupportedType,
    /// Stopping the capture failed
    StopFailed,
    /// A selected file could not be read
    ReadFailed,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Invalid configuration
    Config,
    /// Clipboard write failed
    Clipboard,
    /// The session service is no longer running
    SessionClosed,
}

/// Represents an error that occurred during a scan session
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create an engine initialization error
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::EngineInit, None, message)
    }

    /// Create a camera acquisition error
    pub fn camera(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::CameraAcquisition, None, message)
    }

    /// Create a decode failure
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::DecodeFailed, None, message)
    }

    /// Create an unsupported type error
    pub fn unsupported_type(name: &str) -> Self {
        Self::new(
            ScanErrorKind::UnsupportedType,
            None,
            format!("{} is not an image file", name),
        )
    }

    /// Create a stop failure
    pub fn stop_failed(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::StopFailed, None, message)
    }

    /// Create a read failure
    pub fn read_failed(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::ReadFailed, path, message)
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Config, None, message)
    }

    /// Create a clipboard error
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Clipboard, None, message)
    }

    /// The session service has shut down
    pub fn session_closed() -> Self {
        Self::new(ScanErrorKind::SessionClosed, None, "Scan session is closed")
    }

    /// Attach a path to this error
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => io.into(),
            other => Self::decode_failed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

//! Core data models for scan sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Source label used for results decoded from the camera
pub const CAMERA_SOURCE: &str = "Camera capture";

/// Infer a content type from a file extension
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "txt" | "md" | "csv" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Where the bytes of a selected file come from
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on disk, read when it is decoded
    Path(PathBuf),
    /// Bytes already in memory
    Memory(Vec<u8>),
}

/// A file handed to the session by a selection action
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// File name without path
    pub name: String,
    /// Claimed content type (e.g. "image/png")
    pub content_type: String,
    /// Where to read the file from
    pub source: FileSource,
}

impl ImageFile {
    /// Create a file backed by a path; the content type comes from the extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self {
            name,
            content_type: content_type_for_extension(extension).to_string(),
            source: FileSource::Path(path),
        }
    }

    /// Create an in-memory file with an explicit content type
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source: FileSource::Memory(bytes),
        }
    }

    /// Whether the file claims an image content type
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Path of the file, if it lives on disk
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(p) => Some(p),
            FileSource::Memory(_) => None,
        }
    }

    /// Read the whole file
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ScanError> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ScanError::read_failed(Some(path.clone()), e.to_string())),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A successfully decoded code and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedResult {
    /// Decoded text
    pub decoded_text: String,
    /// "Camera capture" or the originating file name
    pub source_label: String,
    /// When the code was decoded
    pub scanned_at: DateTime<Utc>,
}

impl ScannedResult {
    /// Create a result stamped with the current time
    pub fn new(decoded_text: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            decoded_text: decoded_text.into(),
            source_label: source_label.into(),
            scanned_at: Utc::now(),
        }
    }

    /// Whether this result came from the camera
    pub fn is_from_camera(&self) -> bool {
        self.source_label == CAMERA_SOURCE
    }
}

/// Outcome of one file batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of files in the selection
    pub total_files: u64,
    /// Files that decoded to a code
    pub decoded: u64,
    /// Files skipped because they are not images
    pub not_images: u64,
    /// Images in which no code was found
    pub no_code: u64,
    /// Files that could not be read
    pub read_failures: u64,
    /// Results in the order they were emitted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ScannedResult>,
    /// Total batch duration in milliseconds
    pub duration_ms: u64,
}

impl BatchSummary {
    /// Create a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files that did not produce a result
    pub fn failure_count(&self) -> u64 {
        self.not_images + self.no_code + self.read_failures
    }

    /// Check if every file decoded
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

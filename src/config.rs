//! Configuration for scan sessions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::engine::CaptureConfig;
use crate::error::ScanError;

/// Identifier of the visual surface the engine binds to
pub const DEFAULT_SURFACE_ID: &str = "scanner-container";

/// Target camera frame rate (frames per second)
pub const DEFAULT_FPS: u32 = 10;

/// Highest accepted camera frame rate
pub const MAX_FPS: u32 = 1000;

/// Side of the square detection region, in logical units
pub const DEFAULT_DETECTION_BOX: u32 = 280;

/// Aspect ratio of the camera preview
pub const DEFAULT_ASPECT_RATIO: f32 = 1.0;

/// How long the copy button shows "Copied" (milliseconds)
pub const DEFAULT_COPY_FEEDBACK_MS: u64 = 2000;

/// Capacity of the camera frame event channel
pub const DEFAULT_FRAME_BUFFER: usize = 8;

/// Default max depth for directory inputs
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Which camera to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera
    #[default]
    Environment,
    /// Front camera
    User,
}

impl FacingMode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

/// Configuration for a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Identifier of the visual surface the engine is bound to
    pub surface_id: String,

    /// Camera to request when capturing
    pub facing_mode: FacingMode,

    /// Target frame rate for camera capture
    pub fps: u32,

    /// Side of the square detection region
    pub detection_box: u32,

    /// Preview aspect ratio
    pub aspect_ratio: f32,

    /// Capacity of the frame event channel
    pub frame_buffer: usize,

    /// Image extensions picked up when expanding directories
    pub image_extensions: HashSet<String>,

    /// Directory names to ignore when expanding directories
    pub ignore_dirs: HashSet<String>,

    /// Whether directory inputs are expanded recursively
    pub recursive: bool,

    /// Maximum depth for recursive expansion
    pub max_depth: usize,

    /// How long copy feedback stays visible, in milliseconds
    pub copy_feedback_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            surface_id: DEFAULT_SURFACE_ID.to_string(),
            facing_mode: FacingMode::default(),
            fps: DEFAULT_FPS,
            detection_box: DEFAULT_DETECTION_BOX,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            frame_buffer: DEFAULT_FRAME_BUFFER,
            image_extensions: Self::default_image_extensions(),
            ignore_dirs: Self::default_ignore_dirs(),
            recursive: true,
            max_depth: DEFAULT_MAX_DEPTH,
            copy_feedback_ms: DEFAULT_COPY_FEEDBACK_MS,
        }
    }
}

impl ScanConfig {
    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::from(e).with_path(path.to_path_buf()))?;
        let config: ScanConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the capture loop cannot work with
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ScanError::config(format!(
                "fps must be between 1 and {}",
                MAX_FPS
            )));
        }
        if self.detection_box == 0 {
            return Err(ScanError::config("detection_box must be greater than zero"));
        }
        if self.frame_buffer == 0 {
            return Err(ScanError::config("frame_buffer must be greater than zero"));
        }
        if self.surface_id.is_empty() {
            return Err(ScanError::config("surface_id must not be empty"));
        }
        Ok(())
    }

    /// Get the default image extensions
    pub fn default_image_extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            ".Trash",
            "@eaDir",
            ".git",
            "node_modules",
            ".cache",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Check if an extension is picked up from directories
    pub fn should_include_extension(&self, ext: &str) -> bool {
        self.image_extensions.contains(&ext.to_lowercase())
    }

    /// Check if a directory should be ignored
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Get the effective max depth for walkdir
    pub fn effective_max_depth(&self) -> usize {
        if !self.recursive {
            1
        } else {
            self.max_depth
        }
    }

    /// Camera capture parameters derived from this config
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            facing_mode: self.facing_mode,
            fps: self.fps,
            detection_box: self.detection_box,
            aspect_ratio: self.aspect_ratio,
            frame_buffer: self.frame_buffer,
        }
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the visual surface identifier
    pub fn surface_id(mut self, id: impl Into<String>) -> Self {
        self.config.surface_id = id.into();
        self
    }

    /// Set the camera facing mode
    pub fn facing_mode(mut self, mode: FacingMode) -> Self {
        self.config.facing_mode = mode;
        self
    }

    /// Set the target frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.config.fps = fps;
        self
    }

    /// Set the detection region side
    pub fn detection_box(mut self, side: u32) -> Self {
        self.config.detection_box = side;
        self
    }

    /// Set the frame channel capacity
    pub fn frame_buffer(mut self, capacity: usize) -> Self {
        self.config.frame_buffer = capacity;
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Enable or disable recursive directory expansion
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.config.recursive = enabled;
        self
    }

    /// Set the maximum depth for recursive expansion
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Set the copy feedback window
    pub fn copy_feedback_ms(mut self, ms: u64) -> Self {
        self.config.copy_feedback_ms = ms;
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}

//! Decoding engine abstraction
//!
//! A [`DecodingEngine`] is bound to one visual surface and can either run a
//! continuous camera capture, delivering one [`FrameEvent`] per frame, or
//! decode a single still image. Engines are not reentrant: every operation
//! takes `&mut self`, so a second in-flight decode cannot be issued.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::FacingMode;
use crate::error::ScanError;
use crate::models::ImageFile;

/// Shortest gap between two captured frames
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Receiving end of a camera capture
pub type FrameReceiver = mpsc::Receiver<FrameEvent>;

/// Parameters for a camera capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Which camera to request
    pub facing_mode: FacingMode,
    /// Target frames per second
    pub fps: u32,
    /// Side of the square detection region
    pub detection_box: u32,
    /// Preview aspect ratio
    pub aspect_ratio: f32,
    /// Capacity of the frame event channel
    pub frame_buffer: usize,
}

impl CaptureConfig {
    /// Interval between two frames
    pub fn frame_interval(&self) -> Duration {
        let nanos = 1_000_000_000 / u64::from(self.fps.max(1));
        Duration::from_nanos(nanos).max(MIN_FRAME_INTERVAL)
    }
}

/// Outcome of one camera frame
#[derive(Debug, Clone)]
pub enum FrameEvent {
    /// A code was decoded from the frame
    Decoded(String),
    /// No code in this frame; expected while the user aims the camera
    Miss(String),
    /// The capture cannot continue
    Failed(ScanError),
}

/// An engine capable of camera capture and still-image decoding
#[async_trait]
pub trait DecodingEngine: Send {
    /// Identifier of the surface this engine is bound to
    fn surface_id(&self) -> &str;

    /// Start a continuous capture; frame outcomes arrive on the returned channel
    async fn start(&mut self, config: &CaptureConfig) -> Result<FrameReceiver, ScanError>;

    /// Whether a capture is currently running
    fn is_capturing(&self) -> bool;

    /// Stop the running capture
    async fn stop(&mut self) -> Result<(), ScanError>;

    /// Decode a single still image
    async fn decode_image(&mut self, file: &ImageFile) -> Result<String, ScanError>;
}

/// Constructs engines bound to a surface
#[async_trait]
pub trait EngineFactory: Send {
    async fn create(&mut self, surface_id: &str) -> Result<Box<dyn DecodingEngine>, ScanError>;
}

//! QR decoding engine backed by `rqrr`
//!
//! Still images are decoded on a blocking thread. Camera capture runs as a
//! spawned task that pulls frames from a [`Camera`] at the configured rate,
//! decodes the centered detection square and pushes one [`FrameEvent`] per
//! frame. Stopping the capture joins the task and hands the camera back to
//! the engine so a later capture can reuse it.

use async_trait::async_trait;
use image::GrayImage;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use walkdir::WalkDir;

use crate::config::{FacingMode, ScanConfig};
use crate::engine::{CaptureConfig, DecodingEngine, EngineFactory, FrameEvent, FrameReceiver};
use crate::error::ScanError;
use crate::models::ImageFile;

/// A source of grayscale camera frames
#[async_trait]
pub trait Camera: Send + 'static {
    /// Acquire the camera
    async fn open(&mut self, facing: FacingMode) -> Result<(), ScanError>;

    /// Next frame, or `None` when the stream has ended
    async fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError>;

    /// Release the camera
    async fn close(&mut self);
}

/// Decode the first non-empty QR code in a grayscale image
pub fn decode_luma(image: GrayImage) -> Option<String> {
    let mut prepared = rqrr::PreparedImage::prepare(image);
    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| match grid.decode() {
            Ok((_meta, content)) if !content.is_empty() => Some(content),
            _ => None,
        })
}

/// Decode an encoded image file
pub fn decode_bytes(bytes: &[u8]) -> Result<String, ScanError> {
    let image = image::load_from_memory(bytes)?.to_luma8();
    decode_luma(image).ok_or_else(|| ScanError::decode_failed("No QR code found in image"))
}

/// The centered square a frame is decoded from, clamped to the frame size
pub fn detection_region(frame: &GrayImage, side: u32) -> GrayImage {
    let (width, height) = frame.dimensions();
    let side = side.min(width).min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    image::imageops::crop_imm(frame, x, y, side, side).to_image()
}

async fn decode_frame(frame: GrayImage, detection_box: u32) -> FrameEvent {
    let decoded = tokio::task::spawn_blocking(move || {
        decode_luma(detection_region(&frame, detection_box))
    })
    .await;
    match decoded {
        Ok(Some(text)) => FrameEvent::Decoded(text),
        Ok(None) => FrameEvent::Miss("No QR code found in frame".to_string()),
        Err(e) => FrameEvent::Miss(format!("Frame decode aborted: {}", e)),
    }
}

async fn capture_loop(
    mut camera: Box<dyn Camera>,
    config: CaptureConfig,
    tx: mpsc::Sender<FrameEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Box<dyn Camera> {
    let mut ticker = tokio::time::interval(config.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let event = match camera.next_frame().await {
                    Ok(Some(frame)) => decode_frame(frame, config.detection_box).await,
                    Ok(None) => {
                        log::info!("Camera stream ended");
                        break;
                    }
                    Err(e) => FrameEvent::Failed(e),
                };
                let fatal = matches!(event, FrameEvent::Failed(_));
                if tx.send(event).await.is_err() || fatal {
                    break;
                }
            }
        }
    }

    camera.close().await;
    camera
}

struct CaptureTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<Box<dyn Camera>>,
}

/// `rqrr` engine bound to one surface
pub struct QrEngine {
    surface_id: String,
    camera: Option<Box<dyn Camera>>,
    capture: Option<CaptureTask>,
}

impl QrEngine {
    pub fn new(surface_id: impl Into<String>, camera: Option<Box<dyn Camera>>) -> Self {
        Self {
            surface_id: surface_id.into(),
            camera,
            capture: None,
        }
    }

    /// Take back the camera from a capture that ended on its own
    async fn reclaim_finished(&mut self) {
        let finished = self
            .capture
            .as_ref()
            .is_some_and(|task| task.handle.is_finished());
        if !finished {
            return;
        }
        if let Some(task) = self.capture.take() {
            match task.handle.await {
                Ok(camera) => self.camera = Some(camera),
                Err(e) => log::error!("Capture task failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl DecodingEngine for QrEngine {
    fn surface_id(&self) -> &str {
        &self.surface_id
    }

    async fn start(&mut self, config: &CaptureConfig) -> Result<FrameReceiver, ScanError> {
        self.reclaim_finished().await;
        if self.capture.is_some() {
            return Err(ScanError::camera("Capture already running"));
        }

        let mut camera = self
            .camera
            .take()
            .ok_or_else(|| ScanError::camera("No camera available"))?;
        if let Err(e) = camera.open(config.facing_mode).await {
            self.camera = Some(camera);
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(config.frame_buffer.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(capture_loop(camera, *config, tx, stop_rx));
        self.capture = Some(CaptureTask { stop_tx, handle });

        log::info!(
            "Capture started on {} ({} fps, {}x{} detection box)",
            self.surface_id,
            config.fps,
            config.detection_box,
            config.detection_box
        );
        Ok(rx)
    }

    fn is_capturing(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    async fn stop(&mut self) -> Result<(), ScanError> {
        let Some(task) = self.capture.take() else {
            return Ok(());
        };
        // The task may already be gone, in which case nobody is listening.
        let _ = task.stop_tx.send(());
        match task.handle.await {
            Ok(camera) => {
                self.camera = Some(camera);
                log::info!("Capture stopped on {}", self.surface_id);
                Ok(())
            }
            Err(e) => Err(ScanError::stop_failed(e.to_string())),
        }
    }

    async fn decode_image(&mut self, file: &ImageFile) -> Result<String, ScanError> {
        let bytes = file.read_bytes().await?;
        tokio::task::spawn_blocking(move || decode_bytes(&bytes))
            .await
            .map_err(|e| ScanError::decode_failed(e.to_string()))?
    }
}

/// Creates [`QrEngine`]s, handing over the camera to the first one
pub struct QrEngineFactory {
    camera: Option<Box<dyn Camera>>,
}

impl QrEngineFactory {
    pub fn new(camera: Option<Box<dyn Camera>>) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl EngineFactory for QrEngineFactory {
    async fn create(&mut self, surface_id: &str) -> Result<Box<dyn DecodingEngine>, ScanError> {
        if surface_id.is_empty() {
            return Err(ScanError::engine_init("Surface id is empty"));
        }
        Ok(Box::new(QrEngine::new(surface_id, self.camera.take())))
    }
}

/// Replays image files from a directory as camera frames
pub struct DirectoryCamera {
    dir: PathBuf,
    extensions: HashSet<String>,
    frames: VecDeque<PathBuf>,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: ScanConfig::default_image_extensions(),
            frames: VecDeque::new(),
        }
    }

    fn list_frames(&self) -> VecDeque<PathBuf> {
        WalkDir::new(&self.dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| self.extensions.contains(&e.to_lowercase()))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[async_trait]
impl Camera for DirectoryCamera {
    async fn open(&mut self, facing: FacingMode) -> Result<(), ScanError> {
        if !self.dir.is_dir() {
            return Err(ScanError::camera(format!("Camera not found: {:?}", self.dir)));
        }
        self.frames = self.list_frames();
        if self.frames.is_empty() {
            return Err(ScanError::camera(format!(
                "No frames available in {:?}",
                self.dir
            )));
        }
        log::debug!(
            "Opened {} camera with {} frames from {:?}",
            facing.as_str(),
            self.frames.len(),
            self.dir
        );
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError> {
        let Some(path) = self.frames.pop_front() else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ScanError::camera(e.to_string()).with_path(path.clone()))?;
        let frame = image::load_from_memory(&bytes)
            .map_err(|e| ScanError::camera(e.to_string()).with_path(path))?
            .to_luma8();
        Ok(Some(frame))
    }

    async fn close(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{GrayImage, Luma};

    /// Render `text` as a QR code with a 4-module quiet zone
    pub fn qr_image(text: &str, scale: u32) -> GrayImage {
        let code = qrcode::QrCode::new(text.as_bytes()).unwrap();
        let width = code.width() as u32;
        let colors = code.to_colors();
        let quiet = 4;
        let size = (width + 2 * quiet) * scale;

        GrayImage::from_fn(size, size, |x, y| {
            let (mx, my) = (x / scale, y / scale);
            if mx < quiet || my < quiet || mx >= width + quiet || my >= width + quiet {
                return Luma([255]);
            }
            let index = ((my - quiet) * width + (mx - quiet)) as usize;
            if colors[index] == qrcode::Color::Dark {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    /// A 640x480 frame with the code centered
    pub fn frame_with(text: &str) -> GrayImage {
        let code = qr_image(text, 8);
        let mut frame = GrayImage::from_pixel(640, 480, Luma([255]));
        let x = (640 - code.width() as i64) / 2;
        let y = (480 - code.height() as i64) / 2;
        image::imageops::overlay(&mut frame, &code, x, y);
        frame
    }

    pub fn blank_frame() -> GrayImage {
        GrayImage::from_pixel(640, 480, Luma([255]))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::error::ScanErrorKind;
    use image::Luma;

    /// Camera serving frames from memory
    struct MemoryCamera {
        frames: VecDeque<GrayImage>,
        fail_open: bool,
    }

    #[async_trait]
    impl Camera for MemoryCamera {
        async fn open(&mut self, _facing: FacingMode) -> Result<(), ScanError> {
            if self.fail_open {
                return Err(ScanError::camera("Permission denied"));
            }
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError> {
            Ok(self.frames.pop_front())
        }

        async fn close(&mut self) {}
    }

    fn fast_capture() -> CaptureConfig {
        ScanConfig::builder().fps(100).build().capture_config()
    }

    #[test]
    fn test_decode_luma_finds_code() {
        assert_eq!(decode_luma(qr_image("hello", 6)), Some("hello".to_string()));
    }

    #[test]
    fn test_decode_luma_blank() {
        assert_eq!(decode_luma(blank_frame()), None);
    }

    #[test]
    fn test_detection_region() {
        let region = detection_region(&blank_frame(), 280);
        assert_eq!(region.dimensions(), (280, 280));

        let small = GrayImage::from_pixel(100, 50, Luma([0]));
        assert_eq!(detection_region(&small, 280).dimensions(), (50, 50));
    }

    #[test]
    fn test_detection_region_keeps_centered_code() {
        assert_eq!(
            decode_luma(detection_region(&frame_with("ABC123"), 280)),
            Some("ABC123".to_string())
        );
    }

    #[test]
    fn test_decode_bytes_rejects_garbage() {
        let err = decode_bytes(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::DecodeFailed);
    }

    #[tokio::test]
    async fn test_decode_image_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("a.png");
        let blank = dir.path().join("blank.png");
        qr_image("111", 6).save(&code).unwrap();
        blank_frame().save(&blank).unwrap();

        let mut engine = QrEngine::new("scanner-container", None);
        let decoded = engine.decode_image(&ImageFile::from_path(&code)).await.unwrap();
        assert_eq!(decoded, "111");

        let err = engine
            .decode_image(&ImageFile::from_path(&blank))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::DecodeFailed);
    }

    #[tokio::test]
    async fn test_start_without_camera() {
        let mut engine = QrEngine::new("scanner-container", None);
        let err = engine.start(&fast_capture()).await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::CameraAcquisition);
        assert!(!engine.is_capturing());
    }

    #[tokio::test]
    async fn test_open_failure_keeps_camera() {
        let camera = MemoryCamera {
            frames: VecDeque::new(),
            fail_open: true,
        };
        let mut engine = QrEngine::new("scanner-container", Some(Box::new(camera)));
        assert!(engine.start(&fast_capture()).await.is_err());
        assert!(engine.camera.is_some());
    }

    #[tokio::test]
    async fn test_capture_reports_misses_then_code() {
        let camera = MemoryCamera {
            frames: VecDeque::from(vec![blank_frame(), blank_frame(), frame_with("ABC123")]),
            fail_open: false,
        };
        let mut engine = QrEngine::new("scanner-container", Some(Box::new(camera)));
        let mut frames = engine.start(&fast_capture()).await.unwrap();

        assert!(matches!(frames.recv().await, Some(FrameEvent::Miss(_))));
        assert!(matches!(frames.recv().await, Some(FrameEvent::Miss(_))));
        match frames.recv().await {
            Some(FrameEvent::Decoded(text)) => assert_eq!(text, "ABC123"),
            other => panic!("expected decoded frame, got {:?}", other),
        }

        engine.stop().await.unwrap();
        assert!(!engine.is_capturing());
        assert!(engine.camera.is_some());
    }

    #[tokio::test]
    async fn test_capture_survives_very_high_fps() {
        let camera = MemoryCamera {
            frames: VecDeque::from(vec![frame_with("FAST")]),
            fail_open: false,
        };
        let capture = ScanConfig::builder().fps(2000).build().capture_config();
        let mut engine = QrEngine::new("scanner-container", Some(Box::new(camera)));
        let mut frames = engine.start(&capture).await.unwrap();

        match frames.recv().await {
            Some(FrameEvent::Decoded(text)) => assert_eq!(text, "FAST"),
            other => panic!("expected decoded frame, got {:?}", other),
        }

        engine.stop().await.unwrap();
        assert!(engine.camera.is_some());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut engine = QrEngine::new("scanner-container", None);
        engine.stop().await.unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_factory_rejects_empty_surface() {
        let mut factory = QrEngineFactory::new(None);
        let err = factory.create("").await.err().unwrap();
        assert_eq!(err.kind, ScanErrorKind::EngineInit);

        let engine = factory.create("scanner-container").await.unwrap();
        assert_eq!(engine.surface_id(), "scanner-container");
    }

    #[tokio::test]
    async fn test_directory_camera_missing_dir() {
        let mut camera = DirectoryCamera::new("/definitely/not/here");
        let err = camera.open(FacingMode::Environment).await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::CameraAcquisition);
    }

    #[tokio::test]
    async fn test_directory_camera_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let mut camera = DirectoryCamera::new(dir.path());
        let err = camera.open(FacingMode::Environment).await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::CameraAcquisition);
    }

    #[tokio::test]
    async fn test_directory_camera_replays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        blank_frame().save(dir.path().join("0001.png")).unwrap();
        frame_with("ABC123").save(dir.path().join("0002.png")).unwrap();

        let mut camera = DirectoryCamera::new(dir.path());
        camera.open(FacingMode::Environment).await.unwrap();

        let first = camera.next_frame().await.unwrap().unwrap();
        assert_eq!(decode_luma(first), None);
        let second = camera.next_frame().await.unwrap().unwrap();
        assert_eq!(decode_luma(second), Some("ABC123".to_string()));
        assert!(camera.next_frame().await.unwrap().is_none());
    }

    fn qr_session(
        camera: Option<Box<dyn Camera>>,
    ) -> (
        crate::session::ScanSession,
        std::sync::Arc<crate::notify::RecordingNotifier>,
    ) {
        let notifier = std::sync::Arc::new(crate::notify::RecordingNotifier::new());
        let session = crate::session::ScanSession::new(
            ScanConfig::builder().fps(100).build(),
            Box::new(QrEngineFactory::new(camera)),
            notifier.clone(),
            Box::new(crate::present::RecordingPresenter::new()),
        );
        (session, notifier)
    }

    #[tokio::test]
    async fn test_session_decodes_real_files() {
        let dir = tempfile::tempdir().unwrap();
        qr_image("111", 6).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"not an image").unwrap();
        blank_frame().save(dir.path().join("c.jpg")).unwrap();
        qr_image("222", 6).save(dir.path().join("d.png")).unwrap();

        let files = ["a.png", "b.txt", "c.jpg", "d.png"]
            .iter()
            .map(|name| ImageFile::from_path(dir.path().join(name)))
            .collect();

        let (mut session, notifier) = qr_session(None);
        let summary = session
            .process_files(crate::input::InputKind::Upload, files)
            .await;

        let decoded: Vec<_> = summary
            .results
            .iter()
            .map(|r| (r.decoded_text.as_str(), r.source_label.as_str()))
            .collect();
        assert_eq!(decoded, [("111", "a.png"), ("222", "d.png")]);
        assert_eq!(
            notifier.errors(),
            vec!["b.txt is not an image file", "No barcode found in c.jpg"]
        );
        assert_eq!(session.current_result().unwrap().decoded_text, "222");
    }

    #[tokio::test]
    async fn test_session_scans_directory_camera() {
        let dir = tempfile::tempdir().unwrap();
        blank_frame().save(dir.path().join("0001.png")).unwrap();
        blank_frame().save(dir.path().join("0002.png")).unwrap();
        frame_with("ABC123").save(dir.path().join("0003.png")).unwrap();
        frame_with("NEXT").save(dir.path().join("0004.png")).unwrap();

        let (mut session, _notifier) =
            qr_session(Some(Box::new(DirectoryCamera::new(dir.path()))));
        session.open_choice();
        assert!(session.start_camera_capture().await);

        let result = session.run_camera().await.unwrap();
        assert_eq!(result.decoded_text, "ABC123");
        assert!(result.is_from_camera());
        assert_eq!(session.mode(), crate::mode::ScanMode::Idle);
        assert!(!session.surface().is_visible());

        session.dispose().await;
    }
}

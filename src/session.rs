//! Scan session lifecycle
//!
//! [`ScanSession`] owns the decoding engine, the visual surface and the file
//! inputs, and moves the [`ScanMode`] machine in response to user intent and
//! engine outcomes. Every failure is turned into a notification where it
//! happens; no operation here returns an error to the caller.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::config::ScanConfig;
use crate::engine::{DecodingEngine, EngineFactory, FrameEvent, FrameReceiver};
use crate::error::{ScanError, ScanErrorKind};
use crate::input::{FileInput, InputKind};
use crate::mode::{ModeEvent, ScanMode};
use crate::models::{BatchSummary, ImageFile, ScannedResult, CAMERA_SOURCE};
use crate::notify::Notifier;
use crate::present::ResultPresenter;
use crate::surface::VisualSurface;

const ENGINE_INIT_FAILED: &str = "Failed to initialize barcode scanner";
const ENGINE_NOT_INITIALIZED: &str = "Scanner not initialized";
const CAMERA_START_FAILED: &str = "Failed to start camera. Please try uploading an image instead.";
const CAMERA_STREAM_ENDED: &str = "Camera stream ended";

/// Read-only view of a session for a rendering layer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub mode: ScanMode,
    pub current: Option<ScannedResult>,
    pub surface_visible: bool,
    pub result_open: bool,
}

/// One scanner bound to one visual surface
pub struct ScanSession {
    config: ScanConfig,
    factory: Box<dyn EngineFactory>,
    engine: Option<Box<dyn DecodingEngine>>,
    surface: VisualSurface,
    frames: Option<FrameReceiver>,
    mode: ScanMode,
    mode_tx: watch::Sender<ScanMode>,
    upload_input: FileInput,
    capture_input: FileInput,
    current: Option<ScannedResult>,
    result_open: bool,
    notifier: Arc<dyn Notifier>,
    presenter: Box<dyn ResultPresenter>,
}

impl ScanSession {
    pub fn new(
        config: ScanConfig,
        factory: Box<dyn EngineFactory>,
        notifier: Arc<dyn Notifier>,
        presenter: Box<dyn ResultPresenter>,
    ) -> Self {
        let surface = VisualSurface::new(config.surface_id.clone());
        Self::with_surface(config, surface, factory, notifier, presenter)
    }

    /// Create a session over an existing surface (which may not be mounted yet)
    pub fn with_surface(
        config: ScanConfig,
        surface: VisualSurface,
        factory: Box<dyn EngineFactory>,
        notifier: Arc<dyn Notifier>,
        presenter: Box<dyn ResultPresenter>,
    ) -> Self {
        let (mode_tx, _) = watch::channel(ScanMode::Idle);
        Self {
            config,
            factory,
            engine: None,
            surface,
            frames: None,
            mode: ScanMode::Idle,
            mode_tx,
            upload_input: FileInput::new(InputKind::Upload),
            capture_input: FileInput::new(InputKind::Capture),
            current: None,
            result_open: false,
            notifier,
            presenter,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Subscribe to mode changes
    pub fn watch_mode(&self) -> watch::Receiver<ScanMode> {
        self.mode_tx.subscribe()
    }

    pub fn current_result(&self) -> Option<&ScannedResult> {
        self.current.as_ref()
    }

    pub fn surface(&self) -> &VisualSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut VisualSurface {
        &mut self.surface
    }

    pub fn input(&self, kind: InputKind) -> &FileInput {
        match kind {
            InputKind::Upload => &self.upload_input,
            InputKind::Capture => &self.capture_input,
        }
    }

    fn input_mut(&mut self, kind: InputKind) -> &mut FileInput {
        match kind {
            InputKind::Upload => &mut self.upload_input,
            InputKind::Capture => &mut self.capture_input,
        }
    }

    pub fn is_engine_bound(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether frame events are being consumed
    pub fn is_scanning(&self) -> bool {
        self.mode == ScanMode::CameraActive && self.frames.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            current: self.current.clone(),
            surface_visible: self.surface.is_visible(),
            result_open: self.result_open,
        }
    }

    fn apply(&mut self, event: ModeEvent) {
        match self.mode.on(event) {
            Ok(next) => {
                if next != self.mode {
                    log::debug!("mode {} -> {} ({:?})", self.mode, next, event);
                }
                self.mode = next;
                self.mode_tx.send_replace(next);
            }
            Err(e) => log::warn!("Ignoring transition: {}", e),
        }
    }

    /// Open the mode-selection surface
    pub fn open_choice(&mut self) {
        self.apply(ModeEvent::OpenChoice);
    }

    /// Close the mode-selection surface without choosing
    pub fn dismiss_choice(&mut self) {
        self.apply(ModeEvent::DismissChoice);
    }

    /// Close the result-presentation surface
    pub fn close_result(&mut self) {
        self.result_open = false;
    }

    /// Bind an engine to the surface unless one is already bound
    pub async fn bind_engine(&mut self) -> Result<(), ScanError> {
        if self.engine.is_some() {
            return Ok(());
        }

        let created = if self.surface.is_mounted() {
            self.factory.create(self.surface.id()).await
        } else {
            Err(ScanError::engine_init(format!(
                "Surface {} is not mounted",
                self.surface.id()
            )))
        };

        match created {
            Ok(engine) => {
                log::info!("Engine bound to {}", engine.surface_id());
                self.engine = Some(engine);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to initialize scanner: {}", e);
                self.notifier.error(ENGINE_INIT_FAILED.to_string());
                Err(e)
            }
        }
    }

    /// Start a camera capture
    ///
    /// Returns whether frames are now being delivered. A request while a
    /// capture or a batch is running is ignored.
    pub async fn start_camera_capture(&mut self) -> bool {
        if self.mode.is_busy() {
            log::warn!("Ignoring camera start while {}", self.mode);
            return false;
        }

        self.surface.show_full();

        if self.bind_engine().await.is_err() {
            self.notifier.error(CAMERA_START_FAILED.to_string());
            self.abort_capture().await;
            return false;
        }

        let capture = self.config.capture_config();
        let started = match self.engine.as_mut() {
            Some(engine) => engine.start(&capture).await,
            None => Err(ScanError::engine_init(ENGINE_NOT_INITIALIZED)),
        };

        match started {
            Ok(frames) => {
                self.frames = Some(frames);
                self.apply(ModeEvent::CameraStarted);
                true
            }
            Err(e) => {
                log::error!("Failed to start camera scanner: {}", e);
                self.notifier.error(CAMERA_START_FAILED.to_string());
                self.abort_capture().await;
                false
            }
        }
    }

    /// Stop the camera capture and hide the surface; safe to call at any time
    pub async fn stop_camera_capture(&mut self) {
        self.apply_stop(ModeEvent::Cancelled).await;
    }

    async fn abort_capture(&mut self) {
        self.release_capture().await;
        if self.mode == ScanMode::CameraActive {
            self.apply(ModeEvent::CameraFailed);
        } else if self.mode == ScanMode::AwaitingChoice {
            self.apply(ModeEvent::DismissChoice);
        }
    }

    async fn apply_stop(&mut self, event: ModeEvent) {
        self.release_capture().await;
        if self.mode == ScanMode::CameraActive {
            self.apply(event);
        }
    }

    async fn release_capture(&mut self) {
        self.frames = None;

        let capturing = self
            .engine
            .as_ref()
            .is_some_and(|engine| engine.is_capturing());
        if !capturing {
            self.surface.hide();
            return;
        }

        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.stop().await {
                log::error!("Failed to stop scanner: {}", e);
            }
        }
        self.surface.hide();
    }

    /// Wait for the next frame event; pending forever when not capturing
    pub async fn next_frame(&mut self) -> Option<FrameEvent> {
        match self.frames.as_mut() {
            Some(frames) => frames.recv().await,
            None => std::future::pending().await,
        }
    }

    /// React to one frame event; `None` means the stream closed
    pub async fn handle_frame(&mut self, event: Option<FrameEvent>) {
        if self.mode != ScanMode::CameraActive {
            return;
        }
        match event {
            Some(FrameEvent::Decoded(text)) => {
                self.emit_result(text, CAMERA_SOURCE.to_string());
                self.apply_stop(ModeEvent::ScanSucceeded).await;
            }
            Some(FrameEvent::Miss(reason)) => {
                log::trace!("QR scan miss: {}", reason);
            }
            Some(FrameEvent::Failed(e)) => {
                log::error!("Camera capture failed: {}", e);
                self.notifier.error(e.message.clone());
                self.apply_stop(ModeEvent::CameraFailed).await;
            }
            None => {
                log::warn!("{}", CAMERA_STREAM_ENDED);
                self.notifier.error(CAMERA_STREAM_ENDED.to_string());
                self.apply_stop(ModeEvent::CameraFailed).await;
            }
        }
    }

    /// Consume frames until the capture ends; returns the result it produced
    pub async fn run_camera(&mut self) -> Option<ScannedResult> {
        let mut produced = None;
        while self.is_scanning() {
            let event = self.next_frame().await;
            let decoded = matches!(event, Some(FrameEvent::Decoded(_)));
            self.handle_frame(event).await;
            if decoded {
                produced = self.current.clone();
            }
        }
        produced
    }

    /// The native file picker returned `files` for `input`
    ///
    /// Returns the batch summary when the selection fired a change.
    pub async fn select_files(
        &mut self,
        input: InputKind,
        files: Vec<ImageFile>,
    ) -> Option<BatchSummary> {
        if self.mode.is_busy() {
            log::warn!("Ignoring file selection while {}", self.mode);
            return None;
        }
        if !self.input_mut(input).select(&files) {
            if files.is_empty() && self.mode == ScanMode::AwaitingChoice {
                self.apply(ModeEvent::SelectionEmpty);
            }
            return None;
        }
        Some(self.process_files(input, files).await)
    }

    /// Decode `files` one at a time, in order
    pub async fn process_files(&mut self, input: InputKind, files: Vec<ImageFile>) -> BatchSummary {
        let start = Instant::now();
        let mut summary = BatchSummary::new();

        if self.mode.is_busy() {
            log::warn!("Ignoring file batch while {}", self.mode);
            return summary;
        }
        if files.is_empty() {
            if self.mode == ScanMode::AwaitingChoice {
                self.apply(ModeEvent::SelectionEmpty);
            }
            return summary;
        }

        self.apply(ModeEvent::FilesSelected);
        summary.total_files = files.len() as u64;

        for file in &files {
            if !file.is_image() {
                self.notifier
                    .error(ScanError::unsupported_type(&file.name).message);
                summary.not_images += 1;
                continue;
            }

            if self.bind_engine().await.is_err() {
                self.notifier.error(ENGINE_NOT_INITIALIZED.to_string());
                summary.read_failures += 1;
                continue;
            }

            let decoded = match self.engine.as_mut() {
                Some(engine) => engine.decode_image(file).await,
                None => Err(ScanError::engine_init(ENGINE_NOT_INITIALIZED)),
            };

            match decoded {
                Ok(text) => {
                    summary.decoded += 1;
                    let result = self.emit_result(text, file.name.clone());
                    summary.results.push(result);
                }
                Err(e) if e.kind == ScanErrorKind::ReadFailed => {
                    log::error!("Error processing {}: {}", file.name, e);
                    self.notifier.error(format!("Failed to scan {}", file.name));
                    summary.read_failures += 1;
                }
                Err(e) => {
                    log::debug!("No code in {}: {}", file.name, e);
                    self.notifier
                        .error(format!("No barcode found in {}", file.name));
                    summary.no_code += 1;
                }
            }
        }

        self.input_mut(input).clear();
        self.apply(ModeEvent::BatchFinished);

        summary.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Batch finished: {} files, {} decoded, {} failed in {}ms",
            summary.total_files,
            summary.decoded,
            summary.failure_count(),
            summary.duration_ms
        );
        summary
    }

    fn emit_result(&mut self, text: String, source: String) -> ScannedResult {
        let result = ScannedResult::new(text, source);
        log::info!(
            "Decoded {:?} from {}",
            result.decoded_text,
            result.source_label
        );
        self.current = Some(result.clone());
        self.result_open = true;
        self.presenter.present(&result);
        self.notifier
            .success(format!("Barcode scanned: {}", result.decoded_text));
        result
    }

    /// Stop any capture and release the engine; never fails
    pub async fn dispose(&mut self) {
        self.frames = None;
        if let Some(mut engine) = self.engine.take() {
            if engine.is_capturing() {
                if let Err(e) = engine.stop().await {
                    log::error!("Failed to stop scanner: {}", e);
                }
            }
            log::debug!("Engine released from {}", engine.surface_id());
        }
        self.surface.hide();
        if self.mode != ScanMode::Idle {
            self.apply(ModeEvent::EngineFailed);
        }
    }
}

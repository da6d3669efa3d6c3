//! Barcode and QR code scan sessions
//!
//! This library manages the lifecycle of a decoding engine bound to a visual
//! surface: live camera capture, sequential decoding of selected image files,
//! result reporting and teardown. Decoding itself sits behind the
//! [`DecodingEngine`] trait; [`QrEngine`] provides it with `rqrr`.

pub mod clipboard;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod input;
pub mod mode;
pub mod models;
pub mod notify;
pub mod present;
pub mod qr;
pub mod service;
pub mod session;
pub mod surface;

pub use clipboard::{Clipboard, CopyButton, TerminalClipboard};
pub use config::{FacingMode, ScanConfig};
pub use engine::{CaptureConfig, DecodingEngine, EngineFactory, FrameEvent, FrameReceiver};
pub use error::{ScanError, ScanErrorKind};
pub use files::{collect_files, CollectedFiles};
pub use input::{FileInput, InputKind};
pub use mode::{ModeEvent, ScanMode, TransitionError};
pub use models::{BatchSummary, FileSource, ImageFile, ScannedResult, CAMERA_SOURCE};
pub use notify::{ConsoleNotifier, Notification, NotificationLevel, Notifier, RecordingNotifier};
pub use present::{ChannelPresenter, RecordingPresenter, ResultPresenter};
pub use qr::{Camera, DirectoryCamera, QrEngine, QrEngineFactory};
pub use service::{spawn, SessionHandle};
pub use session::{ScanSession, SessionSnapshot};
pub use surface::{SurfaceLayout, VisualSurface};

//! Serialized command queue around a [`ScanSession`]
//!
//! One task owns the session and handles commands strictly one at a time.
//! While a capture is running the same task also consumes frame events, so
//! a cancel and a decoded frame can never be handled concurrently.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::ScanError;
use crate::input::InputKind;
use crate::mode::ScanMode;
use crate::models::{BatchSummary, ImageFile};
use crate::session::{ScanSession, SessionSnapshot};

/// Capacity of the command queue
const COMMAND_BUFFER: usize = 32;

enum Command {
    OpenChoice(oneshot::Sender<ScanMode>),
    DismissChoice(oneshot::Sender<ScanMode>),
    StartCamera(oneshot::Sender<bool>),
    Cancel(oneshot::Sender<()>),
    SelectFiles {
        input: InputKind,
        files: Vec<ImageFile>,
        reply: oneshot::Sender<Option<BatchSummary>>,
    },
    CloseResult(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Dispose(oneshot::Sender<()>),
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    mode: watch::Receiver<ScanMode>,
}

/// Move `session` into its own task
pub fn spawn(session: ScanSession) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let mode = session.watch_mode();
    let task = tokio::spawn(run(session, rx));
    (SessionHandle { tx, mode }, task)
}

async fn run(mut session: ScanSession, mut rx: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Dispose(reply)) => {
                    session.dispose().await;
                    let _ = reply.send(());
                    return;
                }
                Some(command) => handle(&mut session, command).await,
                None => break,
            },
            event = session.next_frame(), if session.is_scanning() => {
                session.handle_frame(event).await;
            }
        }
    }
    log::debug!("All session handles dropped; disposing");
    session.dispose().await;
}

async fn handle(session: &mut ScanSession, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        Command::OpenChoice(reply) => {
            session.open_choice();
            let _ = reply.send(session.mode());
        }
        Command::DismissChoice(reply) => {
            session.dismiss_choice();
            let _ = reply.send(session.mode());
        }
        Command::StartCamera(reply) => {
            let started = session.start_camera_capture().await;
            let _ = reply.send(started);
        }
        Command::Cancel(reply) => {
            session.stop_camera_capture().await;
            let _ = reply.send(());
        }
        Command::SelectFiles {
            input,
            files,
            reply,
        } => {
            let summary = session.select_files(input, files).await;
            let _ = reply.send(summary);
        }
        Command::CloseResult(reply) => {
            session.close_result();
            let _ = reply.send(());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        Command::Dispose(reply) => {
            session.dispose().await;
            let _ = reply.send(());
        }
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ScanError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ScanError::session_closed())?;
        response.await.map_err(|_| ScanError::session_closed())
    }

    /// Open the mode-selection surface
    pub async fn open_choice(&self) -> Result<ScanMode, ScanError> {
        self.request(Command::OpenChoice).await
    }

    /// Close the mode-selection surface
    pub async fn dismiss_choice(&self) -> Result<ScanMode, ScanError> {
        self.request(Command::DismissChoice).await
    }

    /// Start the camera; resolves once the start has succeeded or failed
    pub async fn start_camera(&self) -> Result<bool, ScanError> {
        self.request(Command::StartCamera).await
    }

    /// Cancel a running capture
    pub async fn cancel(&self) -> Result<(), ScanError> {
        self.request(Command::Cancel).await
    }

    /// Hand a file selection to the session
    pub async fn select_files(
        &self,
        input: InputKind,
        files: Vec<ImageFile>,
    ) -> Result<Option<BatchSummary>, ScanError> {
        self.request(|reply| Command::SelectFiles {
            input,
            files,
            reply,
        })
        .await
    }

    /// Close the result-presentation surface
    pub async fn close_result(&self) -> Result<(), ScanError> {
        self.request(Command::CloseResult).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ScanError> {
        self.request(Command::Snapshot).await
    }

    /// Stop everything and end the session task
    pub async fn dispose(&self) -> Result<(), ScanError> {
        self.request(Command::Dispose).await
    }

    /// Current mode without a round trip
    pub fn mode(&self) -> ScanMode {
        *self.mode.borrow()
    }

    /// Receiver of mode changes
    pub fn watch_mode(&self) -> watch::Receiver<ScanMode> {
        self.mode.clone()
    }

    /// Wait until the session is idle again
    pub async fn wait_idle(&self) -> Result<(), ScanError> {
        let mut mode = self.mode.clone();
        mode.wait_for(|m| *m == ScanMode::Idle)
            .await
            .map(|_| ())
            .map_err(|_| ScanError::session_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::engine::testing::{Script, ScriptedFactory};
    use crate::engine::FrameEvent;
    use crate::error::ScanErrorKind;
    use crate::notify::RecordingNotifier;
    use crate::present::RecordingPresenter;
    use std::sync::Arc;

    fn spawn_scripted(
        script: Script,
    ) -> (
        SessionHandle,
        JoinHandle<()>,
        crate::engine::testing::EngineProbe,
        RecordingPresenter,
    ) {
        let (factory, probe) = ScriptedFactory::new(script);
        let presenter = RecordingPresenter::new();
        let session = ScanSession::new(
            ScanConfig::default(),
            Box::new(factory),
            Arc::new(RecordingNotifier::new()),
            Box::new(presenter.clone()),
        );
        let (handle, task) = spawn(session);
        (handle, task, probe, presenter)
    }

    #[tokio::test]
    async fn test_camera_result_through_queue() {
        let (handle, _task, probe, presenter) = spawn_scripted(Script::frames(vec![
            FrameEvent::Miss("no code".into()),
            FrameEvent::Decoded("ABC123".into()),
        ]));

        assert_eq!(handle.open_choice().await.unwrap(), ScanMode::AwaitingChoice);
        assert!(handle.start_camera().await.unwrap());
        handle.wait_idle().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.mode, ScanMode::Idle);
        assert_eq!(snapshot.current.unwrap().decoded_text, "ABC123");
        assert!(!snapshot.surface_visible);
        assert_eq!(presenter.results().len(), 1);
        assert_eq!(probe.state().stop_calls, 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_capture() {
        let (handle, _task, probe, presenter) = spawn_scripted(Script::frames(vec![]));

        assert!(handle.start_camera().await.unwrap());
        assert_eq!(handle.mode(), ScanMode::CameraActive);
        assert!(handle.snapshot().await.unwrap().surface_visible);

        handle.cancel().await.unwrap();
        assert_eq!(handle.mode(), ScanMode::Idle);
        assert!(!handle.snapshot().await.unwrap().surface_visible);
        assert!(presenter.results().is_empty());
        assert_eq!(probe.state().stop_calls, 1);
    }

    #[tokio::test]
    async fn test_overlapping_starts_bind_once() {
        let (handle, _task, probe, _presenter) = spawn_scripted(Script::frames(vec![]));

        let (first, second) = tokio::join!(handle.start_camera(), handle.start_camera());
        assert!(first.unwrap() ^ second.unwrap());

        let state = probe.state();
        assert_eq!(state.created, 1);
        assert_eq!(state.start_calls, 1);
    }

    #[tokio::test]
    async fn test_select_files_through_queue() {
        let (handle, _task, probe, _presenter) =
            spawn_scripted(Script::default().decode("a.png", Ok("111")));

        let file = ImageFile::from_bytes("a.png", "image/png", Vec::new());
        let summary = handle
            .select_files(InputKind::Upload, vec![file])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.decoded, 1);

        handle.close_result().await.unwrap();
        assert!(!handle.snapshot().await.unwrap().result_open);
        assert_eq!(probe.state().submitted, vec!["a.png"]);
    }

    #[tokio::test]
    async fn test_dispose_ends_task() {
        let (handle, task, probe, _presenter) = spawn_scripted(Script {
            fail_stop: true,
            ..Default::default()
        });
        assert!(handle.start_camera().await.unwrap());

        handle.dispose().await.unwrap();
        task.await.unwrap();

        assert_eq!(probe.state().live, 0);
        let err = handle.snapshot().await.unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::SessionClosed);
    }

    #[tokio::test]
    async fn test_dropping_handles_disposes() {
        let (handle, task, probe, _presenter) = spawn_scripted(Script::frames(vec![]));
        assert!(handle.start_camera().await.unwrap());

        drop(handle);
        task.await.unwrap();
        assert_eq!(probe.state().live, 0);
        assert_eq!(probe.state().stop_calls, 1);
    }
}

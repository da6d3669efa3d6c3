//! Result presentation sinks

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::models::ScannedResult;

/// Displays the current result (e.g. a drawer with the text and a copy action)
pub trait ResultPresenter: Send {
    fn present(&mut self, result: &ScannedResult);
}

/// Forwards every presented result to a channel
pub struct ChannelPresenter {
    tx: UnboundedSender<ScannedResult>,
}

impl ChannelPresenter {
    pub fn new(tx: UnboundedSender<ScannedResult>) -> Self {
        Self { tx }
    }
}

impl ResultPresenter for ChannelPresenter {
    fn present(&mut self, result: &ScannedResult) {
        if self.tx.send(result.clone()).is_err() {
            log::debug!("result receiver dropped; {} not forwarded", result.source_label);
        }
    }
}

/// Keeps presented results in memory; clones share the same list
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    results: Arc<Mutex<Vec<ScannedResult>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ScannedResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ResultPresenter for RecordingPresenter {
    fn present(&mut self, result: &ScannedResult) {
        if let Ok(mut results) = self.results.lock() {
            results.push(result.clone());
        }
    }
}

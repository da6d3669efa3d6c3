//! File-selection inputs
//!
//! A selection only fires a change when its value differs from the current
//! one, so an input has to be cleared after a batch for the same file to be
//! picked again.

use crate::config::FacingMode;
use crate::models::ImageFile;

/// Which selection affordance produced the files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// "Upload image" picker
    Upload,
    /// Live-capture picker that opens the device camera app
    Capture,
}

/// A file input element
#[derive(Debug, Clone)]
pub struct FileInput {
    kind: InputKind,
    accept: &'static str,
    capture: Option<FacingMode>,
    value: Vec<String>,
}

impl FileInput {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            accept: "image/*",
            capture: match kind {
                InputKind::Upload => None,
                InputKind::Capture => Some(FacingMode::Environment),
            },
            value: Vec::new(),
        }
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn accept(&self) -> &str {
        self.accept
    }

    pub fn capture(&self) -> Option<FacingMode> {
        self.capture
    }

    /// Currently selected file names
    pub fn value(&self) -> &[String] {
        &self.value
    }

    /// Set the selection; returns true when a change fires
    pub fn select(&mut self, files: &[ImageFile]) -> bool {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        if names == self.value {
            return false;
        }
        self.value = names;
        !self.value.is_empty()
    }

    /// Reset the value so the same files can be selected again
    pub fn clear(&mut self) {
        self.value.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImageFile {
        ImageFile::from_bytes(name, "image/png", Vec::new())
    }

    #[test]
    fn test_same_selection_fires_once_without_clear() {
        let mut input = FileInput::new(InputKind::Upload);
        assert!(input.select(&[png("a.png")]));
        assert!(!input.select(&[png("a.png")]));
        assert_eq!(input.value(), ["a.png".to_string()]);
    }

    #[test]
    fn test_clear_allows_reselection() {
        let mut input = FileInput::new(InputKind::Upload);
        assert!(input.select(&[png("a.png")]));
        input.clear();
        assert!(input.value().is_empty());
        assert!(input.select(&[png("a.png")]));
    }

    #[test]
    fn test_empty_selection_fires_nothing() {
        let mut input = FileInput::new(InputKind::Capture);
        assert!(!input.select(&[]));
    }

    #[test]
    fn test_capture_input_attributes() {
        let capture = FileInput::new(InputKind::Capture);
        assert_eq!(capture.accept(), "image/*");
        assert_eq!(capture.capture(), Some(FacingMode::Environment));
        assert_eq!(FileInput::new(InputKind::Upload).capture(), None);
    }
}

//! Turns user-supplied paths into the ordered file queue for one batch

use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind};
use crate::models::ImageFile;

/// Files gathered from one selection action
#[derive(Debug, Default)]
pub struct CollectedFiles {
    /// Files in selection order; directory contents sorted by name
    pub files: Vec<ImageFile>,
    /// Directories that were expanded
    pub dirs: u64,
    /// Paths that could not be read
    pub errors: Vec<ScanError>,
}

/// Collect files from the given paths
///
/// Explicit files are queued as given, whatever their type; rejecting
/// non-images is the session's job. Directories contribute only files whose
/// extension is a configured image extension.
pub fn collect_files(paths: &[PathBuf], config: &ScanConfig) -> CollectedFiles {
    let mut collected = CollectedFiles::default();

    for root in paths {
        if !root.exists() {
            collected.errors.push(ScanError::not_found(root.clone()));
            continue;
        }

        if root.is_file() {
            collected.files.push(ImageFile::from_path(root.clone()));
            continue;
        }

        let walker = WalkDir::new(root)
            .max_depth(config.effective_max_depth())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || entry
                        .file_name()
                        .to_str()
                        .map(|name| !config.should_ignore_dir(name))
                        .unwrap_or(false)
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        collected.dirs += 1;
                        continue;
                    }
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let extension = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or_default();
                    if config.should_include_extension(extension) {
                        collected.files.push(ImageFile::from_path(entry.into_path()));
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf());
                    let kind = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::NotFound)
                    {
                        ScanErrorKind::NotFound
                    } else {
                        ScanErrorKind::IoError
                    };
                    collected.errors.push(ScanError::new(kind, path, e.to_string()));
                }
            }
        }
    }

    log::debug!(
        "collected {} files from {} directories ({} errors)",
        collected.files.len(),
        collected.dirs,
        collected.errors.len()
    );
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &std::path::Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_explicit_files_keep_order_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.txt");
        touch(&a);
        touch(&b);

        let collected = collect_files(&[b.clone(), a.clone()], &ScanConfig::default());
        let names: Vec<_> = collected.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["b.txt", "a.png"]);
        assert!(!collected.files[0].is_image());
        assert!(collected.errors.is_empty());
    }

    #[test]
    fn test_directory_expansion_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("z.jpg"));
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("notes.txt"));
        fs::create_dir(dir.path().join(".git")).unwrap();
        touch(&dir.path().join(".git").join("hidden.png"));
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested").join("m.png"));

        let collected = collect_files(&[dir.path().to_path_buf()], &ScanConfig::default());
        let names: Vec<_> = collected.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png", "m.png", "z.jpg"]);
    }

    #[test]
    fn test_non_recursive_expansion() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested").join("m.png"));

        let config = ScanConfig::builder().recursive(false).build();
        let collected = collect_files(&[dir.path().to_path_buf()], &config);
        let names: Vec<_> = collected.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png"]);
    }

    #[test]
    fn test_missing_path_is_reported() {
        let collected = collect_files(
            &[PathBuf::from("/definitely/not/here.png")],
            &ScanConfig::default(),
        );
        assert!(collected.files.is_empty());
        assert_eq!(collected.errors.len(), 1);
        assert_eq!(collected.errors[0].kind, ScanErrorKind::NotFound);
    }
}

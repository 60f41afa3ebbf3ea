//! Document ingestion
//!
//! Turns a file path (or a directory of files) into [`Document`]s for the
//! index host. Only text-like files are considered; unreadable or empty
//! inputs are rejected without touching host state.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::types::Document;

/// Errors produced while loading documents from disk
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("no readable, non-empty documents at '{path}'")]
    Empty { path: String },
}

/// File extensions treated as indexable text
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "rst", "text"];

fn is_text_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        // Extensionless files are accepted; content decides below
        None => true,
    }
}

/// Load documents from a file or a directory.
///
/// A single file must be readable and non-empty. A directory yields one
/// document per readable text file (sorted by path for determinism),
/// skipping files that cannot be read; it fails only when nothing at all
/// could be loaded.
pub fn load_path(path: &Path) -> Result<Vec<Document>, IngestError> {
    if path.is_dir() {
        load_dir(path)
    } else {
        load_file(path).map(|doc| vec![doc])
    }
}

/// Load a single file as one document
pub fn load_file(path: &Path) -> Result<Document, IngestError> {
    let text = std::fs::read_to_string(path).map_err(|e| IngestError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if text.trim().is_empty() {
        return Err(IngestError::Empty {
            path: path.display().to_string(),
        });
    }

    let mut document = Document::new(path.display().to_string(), text.clone());
    if let Some(title) = detect_title(&text) {
        document = document.with_title(title);
    }
    debug!("Loaded document from: {}", path.display());
    Ok(document)
}

fn load_dir(dir: &Path) -> Result<Vec<Document>, IngestError> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_text_file(p))
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        match load_file(&path) {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!("Skipping '{}': {}", path.display(), e),
        }
    }

    if documents.is_empty() {
        return Err(IngestError::Empty {
            path: dir.display().to_string(),
        });
    }
    Ok(documents)
}

/// Title heuristic: a markdown header in the first lines, otherwise the
/// first substantial line.
fn detect_title(text: &str) -> Option<String> {
    for line in text.lines().take(10) {
        let trimmed = line.trim();
        if let Some(title) = trimmed.strip_prefix("# ") {
            if !title.is_empty() {
                return Some(title.trim().to_string());
            }
        }
        if (10..=200).contains(&trimmed.len()) && !trimmed.starts_with('#') {
            return Some(trimmed.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_file_reads_content_and_title() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "# Release Notes\n\nShipped the fix.").unwrap();

        let doc = load_file(&path).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Release Notes"));
        assert!(doc.text.contains("Shipped the fix."));
        assert!(doc.source.ends_with("note.md"));
    }

    #[test]
    fn load_file_rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = load_file(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }

    #[test]
    fn load_file_rejects_empty_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "   \n\t\n").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, IngestError::Empty { .. }));
    }

    #[test]
    fn load_dir_collects_text_files_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second file").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first file").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = load_path(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source.ends_with("a.txt"));
        assert!(docs[1].source.ends_with("b.txt"));
    }

    #[test]
    fn load_dir_with_nothing_usable_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let err = load_path(dir.path()).unwrap_err();
        assert!(matches!(err, IngestError::Empty { .. }));
    }

    #[test]
    fn detect_title_falls_back_to_first_substantial_line() {
        let title = detect_title("Operations Handbook\n\nbody text");
        assert_eq!(title.as_deref(), Some("Operations Handbook"));
    }
}

//! Persisted index image
//!
//! Durable on-disk representation of the index handle: a directory holding
//! the engine snapshot (`image.bin`) and a small metadata record
//! (`meta.json`). Presence of the image at startup signals "recover";
//! absence signals "build fresh or stay empty". Writes are atomic (temp file,
//! fsync, rename) so a crash mid-write never leaves a half image.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const IMAGE_FILE: &str = "image.bin";
const META_FILE: &str = "meta.json";

/// Metadata saved next to the image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMeta {
    pub version: u32,
    pub documents: usize,
    pub saved_at: DateTime<Utc>,
}

impl ImageMeta {
    pub const CURRENT_VERSION: u32 = 1;
}

/// Storage for the persisted index image
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Store rooted at `<data_dir>/index`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("index"),
        }
    }

    /// Whether a persisted image is present
    pub fn exists(&self) -> bool {
        self.dir.join(IMAGE_FILE).exists()
    }

    /// Directory holding the image
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically replace the persisted image
    pub fn save(&self, snapshot: &[u8], documents: usize) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create '{}'", self.dir.display()))?;

        write_atomic(&self.dir.join(IMAGE_FILE), snapshot)?;

        let meta = ImageMeta {
            version: ImageMeta::CURRENT_VERSION,
            documents,
            saved_at: Utc::now(),
        };
        let encoded = serde_json::to_vec_pretty(&meta).context("failed to encode image meta")?;
        write_atomic(&self.dir.join(META_FILE), &encoded)?;

        debug!(
            "Persisted index image: {} documents at {}",
            documents,
            self.dir.display()
        );
        Ok(())
    }

    /// Read the persisted image bytes
    pub fn load(&self) -> Result<Vec<u8>> {
        let path = self.dir.join(IMAGE_FILE);
        fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))
    }

    /// Read the metadata record, if present
    pub fn meta(&self) -> Result<Option<ImageMeta>> {
        let path = self.dir.join(META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
        let meta = serde_json::from_slice(&contents).context("failed to decode image meta")?;
        Ok(Some(meta))
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("failed to create '{}'", temp_path.display()))?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        assert!(!store.exists());
        store.save(b"snapshot-bytes", 3).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), b"snapshot-bytes");

        let meta = store.meta().unwrap().expect("meta should exist");
        assert_eq!(meta.documents, 3);
        assert_eq!(meta.version, ImageMeta::CURRENT_VERSION);
    }

    #[test]
    fn save_replaces_previous_image() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        store.save(b"first", 1).unwrap();
        store.save(b"second", 2).unwrap();

        assert_eq!(store.load().unwrap(), b"second");
        assert_eq!(store.meta().unwrap().unwrap().documents, 2);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        store.save(b"bytes", 1).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn meta_absent_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        assert!(store.meta().unwrap().is_none());
    }
}

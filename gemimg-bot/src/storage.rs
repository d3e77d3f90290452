//! Disk persistence for produced images.
//!
//! Every image the model returns is written under the configured save
//! directory so edit flows and session continuations can re-read it later.
//! Names carry a timestamp and a short uuid to stay unique and sortable.

use gemimg_common::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Saves and reloads produced images under one directory.
pub struct ImageStorage {
    dir: PathBuf,
}

impl ImageStorage {
    /// Create the storage, making the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write image bytes under a `{prefix}_{ts}_{uuid8}.png` name and
    /// return the full path.
    pub fn save(&self, prefix: &str, bytes: &[u8]) -> Result<PathBuf> {
        let ts = chrono::Utc::now().timestamp();
        let tag = &uuid::Uuid::new_v4().simple().to_string()[..8];
        let path = self.dir.join(format!("{prefix}_{ts}_{tag}.png"));
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Image saved");
        Ok(path)
    }

    /// Read an image back. Callers treat a failure as "image gone" and
    /// restart the flow.
    pub fn load(path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = ImageStorage::new(tmp.path().join("imgs")).unwrap();

        let path = storage.save("gemini", b"png-data").unwrap();
        assert!(path.starts_with(storage.dir()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("gemini_"));
        assert_eq!(ImageStorage::load(&path).unwrap(), b"png-data");
    }

    #[test]
    fn test_names_are_unique() {
        let tmp = TempDir::new().unwrap();
        let storage = ImageStorage::new(tmp.path()).unwrap();

        let a = storage.save("edited", b"a").unwrap();
        let b = storage.save("edited", b"b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_load_missing_is_error() {
        assert!(ImageStorage::load(Path::new("/nonexistent/img.png")).is_err());
    }
}

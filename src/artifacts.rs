//! Persisted artifacts for delivery by link.
//!
//! Artifacts live as flat files in one directory and are addressed only by
//! their file name. Names containing path separators or `..` are rejected
//! so the download route cannot escape the directory.

use crate::export::Artifact;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Directory-backed artifact storage.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `name` is a plain file name this store may serve.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 255
            && !name.contains(['/', '\\', '\0'])
            && !name.contains("..")
            && !name.starts_with('.')
    }

    /// Write an artifact, replacing any previous file of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the file cannot be written.
    pub async fn save(&self, artifact: &Artifact) -> crate::Result<PathBuf> {
        let path = self.path_for(&artifact.file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write to a sibling temp file first so downloads never see a partial file.
        let tmp = self.dir.join(format!(".{}.tmp", artifact.file_name));
        tokio::fs::write(&tmp, &artifact.content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Read an artifact by name. `Ok(None)` when unknown or already pruned.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or unreadable files.
    pub async fn load(&self, name: &str) -> crate::Result<Option<Bytes>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an artifact. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or failed deletions.
    pub async fn remove(&self, name: &str) -> crate::Result<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, name: &str) -> crate::Result<PathBuf> {
        if !Self::is_valid_name(name) {
            return Err(crate::RollcallError::Export(format!(
                "invalid artifact name `{name}`"
            )));
        }
        Ok(self.dir.join(name))
    }
}

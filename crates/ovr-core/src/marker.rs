use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::SyncError;
use crate::version::VersionId;

/// The plain-text file recording which build is installed.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the installed version.
    ///
    /// A missing marker is a first run: it is created holding `0.0.0.0` and
    /// [`VersionId::ZERO`] is returned. Unreadable or malformed contents also
    /// yield zero so the next update rewrites them.
    #[must_use]
    pub fn read(&self) -> VersionId {
        if !self.path.exists() {
            info!(
                "No local version marker at {}, assuming first run",
                self.path.display()
            );
            if let Err(error) = self.write(VersionId::ZERO) {
                warn!("Failed to initialize version marker: {error}");
            }
            return VersionId::ZERO;
        }
        self.current()
    }

    /// Read the installed version without creating a missing marker.
    #[must_use]
    pub fn current(&self) -> VersionId {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return VersionId::ZERO;
            }
            Err(error) => {
                warn!(
                    "Failed to read version marker {}: {error}",
                    self.path.display()
                );
                return VersionId::ZERO;
            }
        };

        match VersionId::try_parse(&text) {
            Ok(version) => {
                debug!("Local version {version} read from {}", self.path.display());
                version
            }
            Err(error) => {
                warn!(
                    "Version marker {} is malformed ({error}), treating as 0.0.0.0",
                    self.path.display()
                );
                VersionId::ZERO
            }
        }
    }

    /// Replace the marker contents with `version`.
    ///
    /// The new text is written to a sibling temp file and renamed over the
    /// marker, so readers never observe a partially written version.
    ///
    /// # Errors
    /// Returns [`SyncError::PersistenceError`] when the directory is not
    /// writable or the disk is full.
    pub fn write(&self, version: VersionId) -> Result<(), SyncError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|error| SyncError::persistence(&self.path, error))?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)
            .map_err(|error| SyncError::persistence(&self.path, error))?;
        staged
            .write_all(version.to_string().as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|error| SyncError::persistence(&self.path, error))?;
        staged
            .persist(&self.path)
            .map_err(|error| SyncError::persistence(&self.path, error.error))?;

        info!("Local version set to {version}");
        Ok(())
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Failures of an update cycle.
///
/// Malformed remote versions never appear here; an artifact without a
/// readable version is surfaced as [`crate::CheckOutcome::MalformedRemote`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote store unavailable during {operation}: {details}")]
    RemoteUnavailable {
        operation: &'static str,
        details: String,
    },

    #[error("artifact not found in remote store: {key}")]
    ArtifactNotFound { key: String },

    #[error("download ended after {received} of {expected} bytes")]
    DownloadIncomplete { received: u64, expected: u64 },

    #[error("download stalled: no data received for {}s", .timeout.as_secs())]
    DownloadStalled { timeout: Duration },

    #[error("update cancelled")]
    Cancelled,

    #[error("{context}: {details}")]
    ExtractionError {
        context: &'static str,
        details: String,
    },

    #[error("failed to persist installed version to {}: {source}", .path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an update check is already in progress")]
    Busy,

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn remote_unavailable(operation: &'static str, details: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            operation,
            details: details.into(),
        }
    }

    pub fn remote_unavailable_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::remote_unavailable(operation, error.to_string())
    }

    pub fn artifact_not_found(key: impl Into<String>) -> Self {
        Self::ArtifactNotFound { key: key.into() }
    }

    pub fn extraction(context: &'static str, details: impl std::fmt::Display) -> Self {
        Self::ExtractionError {
            context,
            details: details.to_string(),
        }
    }

    pub(crate) fn extraction_at(context: &'static str, path: &Path, error: &std::io::Error) -> Self {
        Self::extraction(context, format!("{}: {error}", path.display()))
    }

    pub(crate) fn persistence(path: &Path, source: std::io::Error) -> Self {
        Self::PersistenceError {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }

    /// Whether another attempt against the remote store may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::ArtifactNotFound { .. }
        )
    }
}

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::SyncError;
use crate::version::VersionId;

/// One discoverable build in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub key: String,
    pub size: u64,
    /// `None` when the published name or manifest carries no valid version.
    pub version: Option<VersionId>,
}

impl ArtifactDescriptor {
    /// Describe an artifact whose version is embedded in its key
    /// (for example `1.2.3.4.zip`).
    pub fn from_key(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        let version = match VersionId::try_parse(&key) {
            Ok(version) => Some(version),
            Err(error) => {
                log::debug!("Artifact key {key:?} carries no version: {error}");
                None
            }
        };
        Self { key, size, version }
    }

    /// Describe an artifact whose version was published separately from its
    /// key.
    pub fn with_version(key: impl Into<String>, size: u64, version: VersionId) -> Self {
        Self {
            key: key.into(),
            size,
            version: Some(version),
        }
    }

    /// Describe an artifact whose published version could not be read.
    pub fn unversioned(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            version: None,
        }
    }
}

/// An open artifact body and its declared size (zero when unknown).
pub struct ArtifactStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub content_length: u64,
}

impl ArtifactStream {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static, content_length: u64) -> Self {
        Self {
            reader: Box::new(reader),
            content_length,
        }
    }
}

impl fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A remote store of packaged builds.
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    fn name(&self) -> &'static str;

    /// The first artifact in the store's native listing order, or `None` when
    /// nothing has been published.
    async fn list_latest(&self) -> Result<Option<ArtifactDescriptor>, SyncError>;

    /// Open the body of the artifact stored under `key`.
    async fn open_stream(&self, key: &str) -> Result<ArtifactStream, SyncError>;
}

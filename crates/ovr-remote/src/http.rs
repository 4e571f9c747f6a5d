use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::warn;
use ovr_core::{ArtifactCatalog, ArtifactDescriptor, ArtifactStream, SyncError, VersionId};
use reqwest::StatusCode;
use tokio_util::io::StreamReader;

use crate::config::HttpConfig;

const VERSION_PLACEHOLDER: &str = "{version}";

/// Builds announced by a plain-text version manifest and fetched over HTTP.
pub struct HttpCatalog {
    client: reqwest::Client,
    manifest_url: String,
    artifact_url: String,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &HttpConfig) -> Self {
        Self {
            client,
            manifest_url: config.manifest_url.clone(),
            artifact_url: config.artifact_url.clone(),
        }
    }

    fn artifact_key(&self, version: VersionId) -> String {
        self.artifact_url
            .replace(VERSION_PLACEHOLDER, &version.to_string())
    }
}

#[async_trait]
impl ArtifactCatalog for HttpCatalog {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn list_latest(&self) -> Result<Option<ArtifactDescriptor>, SyncError> {
        let response = self
            .client
            .get(&self.manifest_url)
            .send()
            .await
            .map_err(|error| SyncError::remote_unavailable_from("fetch version manifest", error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::remote_unavailable(
                "fetch version manifest",
                format!("HTTP {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|error| SyncError::remote_unavailable_from("read version manifest", error))?;

        let version = match VersionId::try_parse(&text) {
            Ok(version) => version,
            Err(error) => {
                warn!("Version manifest at {} is malformed: {error}", self.manifest_url);
                return Ok(Some(ArtifactDescriptor::unversioned(
                    self.manifest_url.clone(),
                    0,
                )));
            }
        };

        Ok(Some(ArtifactDescriptor::with_version(
            self.artifact_key(version),
            0,
            version,
        )))
    }

    async fn open_stream(&self, key: &str) -> Result<ArtifactStream, SyncError> {
        let response = self
            .client
            .get(key)
            .send()
            .await
            .map_err(|error| SyncError::remote_unavailable_from("open artifact", error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::artifact_not_found(key));
        }
        if !status.is_success() {
            return Err(SyncError::remote_unavailable(
                "open artifact",
                format!("HTTP {status} for {key}"),
            ));
        }

        let content_length = response.content_length().unwrap_or(0);
        let body = response.bytes_stream().map_err(std::io::Error::other);

        Ok(ArtifactStream::new(
            StreamReader::new(Box::pin(body)),
            content_length,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::HttpCatalog;
    use crate::config::HttpConfig;
    use ovr_core::VersionId;

    #[test]
    fn artifact_key_substitutes_version() {
        let catalog = HttpCatalog::new(
            reqwest::Client::new(),
            &HttpConfig {
                manifest_url: "https://cdn.example.com/version.txt".to_string(),
                artifact_url: "https://cdn.example.com/builds/{version}.zip".to_string(),
            },
        );

        assert_eq!(
            catalog.artifact_key(VersionId::new(1, 4, 0, 12)),
            "https://cdn.example.com/builds/1.4.0.12.zip"
        );
    }
}

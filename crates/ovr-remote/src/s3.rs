use async_trait::async_trait;
use log::debug;
use ovr_core::{ArtifactCatalog, ArtifactDescriptor, ArtifactStream, SyncError};
use rusoto_core::credential::StaticProvider;
use rusoto_core::request::HttpClient;
use rusoto_core::{Region, RusotoError};
use rusoto_s3::{GetObjectError, GetObjectRequest, ListObjectsV2Request, S3, S3Client};

use crate::config::{Credentials, S3Config};

/// Builds published as objects in an S3-compatible bucket.
pub struct S3Catalog {
    client: S3Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Catalog {
    /// Connect to the configured endpoint with a static credential pair.
    ///
    /// # Errors
    /// Returns an error if the HTTP dispatcher cannot be created.
    pub fn new(config: &S3Config, credentials: Credentials) -> Result<Self, SyncError> {
        let dispatcher = HttpClient::new()
            .map_err(|error| SyncError::remote_unavailable_from("create S3 client", error))?;
        let provider =
            StaticProvider::new_minimal(credentials.access_key_id, credentials.secret_access_key);
        let region = Region::Custom {
            name: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        Ok(Self {
            client: S3Client::new_with(dispatcher, provider, region),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone().filter(|prefix| !prefix.is_empty()),
        })
    }
}

fn non_negative(value: Option<i64>) -> u64 {
    value
        .and_then(|value| u64::try_from(value).ok())
        .unwrap_or(0)
}

#[async_trait]
impl ArtifactCatalog for S3Catalog {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn list_latest(&self) -> Result<Option<ArtifactDescriptor>, SyncError> {
        let request = ListObjectsV2Request {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            max_keys: Some(1),
            ..Default::default()
        };

        let output = self
            .client
            .list_objects_v2(request)
            .await
            .map_err(|error| SyncError::remote_unavailable_from("list artifacts", error))?;

        // The store's own listing order decides which build is current.
        let Some(object) = output.contents.and_then(|objects| objects.into_iter().next()) else {
            debug!("Bucket {} is empty", self.bucket);
            return Ok(None);
        };
        let Some(key) = object.key else {
            return Ok(None);
        };

        Ok(Some(ArtifactDescriptor::from_key(
            key,
            non_negative(object.size),
        )))
    }

    async fn open_stream(&self, key: &str) -> Result<ArtifactStream, SyncError> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        let output = self
            .client
            .get_object(request)
            .await
            .map_err(|error| match error {
                RusotoError::Service(GetObjectError::NoSuchKey(_)) => {
                    SyncError::artifact_not_found(key)
                }
                RusotoError::Unknown(ref response) if response.status.as_u16() == 404 => {
                    SyncError::artifact_not_found(key)
                }
                other => SyncError::remote_unavailable_from("open artifact", other),
            })?;

        let content_length = non_negative(output.content_length);
        let body = output.body.ok_or_else(|| {
            SyncError::remote_unavailable("open artifact", format!("no body returned for {key}"))
        })?;

        Ok(ArtifactStream::new(body.into_async_read(), content_length))
    }
}

#[cfg(test)]
mod tests {
    use super::non_negative;

    #[test]
    fn negative_or_missing_sizes_are_unknown() {
        assert_eq!(non_negative(Some(42)), 42);
        assert_eq!(non_negative(Some(-1)), 0);
        assert_eq!(non_negative(None), 0);
    }
}

//! Remote stores that publish launcher builds.
//!
//! Two publishing conventions are supported: an S3-compatible bucket whose
//! object keys carry the version, and an HTTP host serving a key-value
//! version manifest next to the artifacts.

mod config;
mod http;
mod s3;

use std::time::Duration;

use ovr_core::{ArtifactCatalog, SyncError};

pub use config::{ACCESS_KEY_ENV, Credentials, HttpConfig, RemoteConfig, S3Config, SECRET_KEY_ENV};
pub use http::HttpCatalog;
pub use s3::S3Catalog;

/// Build the catalog described by `config`.
///
/// # Errors
/// Returns an error when credentials are missing for an S3 store or an HTTP
/// client cannot be constructed.
pub fn catalog_from_config(
    config: &RemoteConfig,
    connect_timeout: Duration,
) -> Result<Box<dyn ArtifactCatalog>, SyncError> {
    match config {
        RemoteConfig::S3(s3) => {
            let credentials = Credentials::resolve(s3.credentials.as_ref())?;
            Ok(Box::new(S3Catalog::new(s3, credentials)?))
        }
        RemoteConfig::Http(http) => {
            let client = reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .user_agent(format!("ovr-launcher/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|error| SyncError::remote_unavailable_from("create HTTP client", error))?;
            Ok(Box::new(HttpCatalog::new(client, http)))
        }
    }
}

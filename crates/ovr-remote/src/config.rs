use std::fmt;

use ovr_core::SyncError;
use serde::{Deserialize, Serialize};

pub const ACCESS_KEY_ENV: &str = "OVR_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "OVR_SECRET_ACCESS_KEY";

/// Which remote store publishes builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    S3(S3Config),
    Http(HttpConfig),
}

/// An S3-compatible bucket whose object keys name the build
/// (`1.2.3.4.zip`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    pub bucket: String,

    #[serde(default)]
    pub prefix: Option<String>,

    /// Used only when the credential environment variables are unset.
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_region() -> String {
    "auto".to_string()
}

/// A plain-text `Major=`/`Minor=`/`Revision=`/`Patch=` manifest plus an
/// artifact URL template with a `{version}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub manifest_url: String,
    pub artifact_url: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from the process environment, falling back to
    /// the configured pair.
    ///
    /// # Errors
    /// Returns [`SyncError::RemoteUnavailable`] when neither source provides
    /// both halves of the pair.
    pub fn resolve(configured: Option<&Credentials>) -> Result<Self, SyncError> {
        Self::resolve_with(|name| std::env::var(name).ok(), configured)
    }

    fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        configured: Option<&Credentials>,
    ) -> Result<Self, SyncError> {
        let from_env = lookup(ACCESS_KEY_ENV)
            .filter(|value| !value.is_empty())
            .zip(lookup(SECRET_KEY_ENV).filter(|value| !value.is_empty()));

        match (from_env, configured) {
            (Some((access_key_id, secret_access_key)), _) => Ok(Self {
                access_key_id,
                secret_access_key,
            }),
            (None, Some(configured)) => Ok(configured.clone()),
            (None, None) => Err(SyncError::remote_unavailable(
                "resolve credentials",
                format!("set {ACCESS_KEY_ENV} and {SECRET_KEY_ENV}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{Credentials, RemoteConfig};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn environment_credentials_take_precedence() {
        let vars = env(&[
            ("OVR_ACCESS_KEY_ID", "env-key"),
            ("OVR_SECRET_ACCESS_KEY", "env-secret"),
        ]);
        let configured = Credentials {
            access_key_id: "file-key".to_string(),
            secret_access_key: "file-secret".to_string(),
        };

        let resolved = Credentials::resolve_with(|name| vars.get(name).cloned(), Some(&configured))
            .expect("credentials should resolve");
        assert_eq!(resolved.access_key_id, "env-key");
        assert_eq!(resolved.secret_access_key, "env-secret");
    }

    #[test]
    fn partial_environment_falls_back_to_configured() {
        let vars = env(&[("OVR_ACCESS_KEY_ID", "env-key")]);
        let configured = Credentials {
            access_key_id: "file-key".to_string(),
            secret_access_key: "file-secret".to_string(),
        };

        let resolved = Credentials::resolve_with(|name| vars.get(name).cloned(), Some(&configured))
            .expect("credentials should resolve");
        assert_eq!(resolved, configured);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let result = Credentials::resolve_with(|_| None, None);
        assert!(result.is_err_and(|error| error.to_string().contains("OVR_ACCESS_KEY_ID")));
    }

    #[test]
    fn debug_redacts_secret() {
        let credentials = Credentials {
            access_key_id: "key".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn remote_config_deserializes_tagged_variants() {
        let s3: RemoteConfig = serde_json::from_value(json!({
            "kind": "s3",
            "endpoint": "https://storage.example.com",
            "bucket": "client-builds"
        }))
        .expect("s3 config should deserialize");
        let RemoteConfig::S3(s3) = s3 else {
            panic!("expected s3 config");
        };
        assert_eq!(s3.region, "auto");
        assert!(s3.prefix.is_none());
        assert!(s3.credentials.is_none());

        let http: RemoteConfig = serde_json::from_value(json!({
            "kind": "http",
            "manifest_url": "https://cdn.example.com/version.txt",
            "artifact_url": "https://cdn.example.com/{version}.zip"
        }))
        .expect("http config should deserialize");
        assert!(matches!(http, RemoteConfig::Http(_)));
    }
}

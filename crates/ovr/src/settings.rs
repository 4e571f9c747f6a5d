use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use ovr_core::{DownloadOptions, InstallLayout, SyncOptions};
use ovr_platform::AppPaths;
use ovr_remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Points the launcher at a settings file outside the config directory.
pub const SETTINGS_PATH_ENV: &str = "OVR_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] ovr_platform::AppPathsError),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// Directory holding the marker, the archive and the installation.
    #[serde(default)]
    pub install_root: Option<PathBuf>,

    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub keep_archive: bool,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 2, 5]
}

fn default_stall_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    ovr_core::install::DEFAULT_CHUNK_SIZE
}

fn default_http_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            install_root: None,
            remote: None,
            retry_delays_secs: default_retry_delays(),
            stall_timeout_secs: default_stall_timeout(),
            chunk_size_bytes: default_chunk_size(),
            http_timeout_secs: default_http_timeout(),
            keep_archive: false,
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl LauncherSettings {
    pub fn settings_path() -> Result<PathBuf, SettingsError> {
        if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV).filter(|path| !path.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        Ok(AppPaths::new()?.settings_file())
    }

    pub fn load() -> Self {
        match Self::settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Self::default(),
        }
    }

    /// Read settings from `path`. A missing file yields defaults; an
    /// unreadable or invalid one yields defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring invalid settings in {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Could not read settings from {}: {error}", path.display());
                Self::default()
            }
        }
    }

    /// Write a settings file with every default spelled out, unless one
    /// already exists. Returns the path when a file was created.
    pub fn write_template_if_missing() -> Result<Option<PathBuf>, SettingsError> {
        let path = Self::settings_path()?;
        if path.exists() {
            return Ok(None);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::default().save_to(&path)?;
        Ok(Some(path))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn install_layout(&self) -> InstallLayout {
        let root = self
            .install_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        InstallLayout::new(root)
    }

    pub fn sync_options(&self) -> SyncOptions {
        let chunk_size = if self.chunk_size_bytes == 0 {
            default_chunk_size()
        } else {
            self.chunk_size_bytes
        };
        let stall_timeout =
            (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs));

        SyncOptions {
            retry_delays: self
                .retry_delays_secs
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
            download: DownloadOptions {
                chunk_size,
                stall_timeout,
            },
            keep_archive: self.keep_archive,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use ovr_remote::RemoteConfig;
    use serde_json::json;

    use super::LauncherSettings;

    #[test]
    fn defaults_match_expected_timeouts() {
        let settings = LauncherSettings::default();

        assert_eq!(settings.retry_delays_secs, vec![0, 2, 5]);
        assert_eq!(settings.stall_timeout_secs, 30);
        assert_eq!(settings.chunk_size_bytes, 80 * 1024);
        assert_eq!(settings.http_timeout_secs, 10);
        assert_eq!(settings.max_log_size_bytes, 5 * 1024 * 1024);
        assert!(!settings.keep_archive);
        assert!(settings.remote.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: LauncherSettings = serde_json::from_value(json!({
            "install_root": "/games/override",
            "remote": {
                "kind": "s3",
                "endpoint": "https://storage.example.com",
                "bucket": "client-builds"
            },
            "stall_timeout_secs": 5
        }))
        .expect("partial settings should deserialize");

        assert_eq!(
            settings.install_layout().root(),
            Path::new("/games/override")
        );
        assert!(matches!(settings.remote, Some(RemoteConfig::S3(_))));
        assert_eq!(settings.stall_timeout_secs, 5);
        assert_eq!(settings.retry_delays_secs, vec![0, 2, 5]);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").expect("settings file should be written");

        let settings = LauncherSettings::load_from(&path);

        assert!(settings.remote.is_none());
        assert_eq!(settings.stall_timeout_secs, 30);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let settings = LauncherSettings::load_from(&temp_dir.path().join("absent.json"));
        assert_eq!(settings.retry_delays_secs, vec![0, 2, 5]);
    }

    #[test]
    fn saved_settings_load_back() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        let settings = LauncherSettings {
            keep_archive: true,
            retry_delays_secs: vec![1],
            ..LauncherSettings::default()
        };

        settings.save_to(&path).expect("settings should save");
        let loaded = LauncherSettings::load_from(&path);

        assert!(loaded.keep_archive);
        assert_eq!(loaded.retry_delays_secs, vec![1]);
    }

    #[test]
    fn sync_options_convert_seconds_and_guard_zero_values() {
        let settings = LauncherSettings {
            retry_delays_secs: vec![0, 3],
            stall_timeout_secs: 0,
            chunk_size_bytes: 0,
            ..LauncherSettings::default()
        };

        let options = settings.sync_options();

        assert_eq!(
            options.retry_delays,
            vec![Duration::ZERO, Duration::from_secs(3)]
        );
        assert!(options.download.stall_timeout.is_none());
        assert_eq!(options.download.chunk_size, 80 * 1024);
    }
}

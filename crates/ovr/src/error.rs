use ovr_core::SyncError;
use thiserror::Error;

use crate::install_lock::LockError;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("no remote store configured; add a \"remote\" section to {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LauncherError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NotConfigured(_) => 2,
            Self::Lock(LockError::AlreadyRunning) | Self::Sync(SyncError::Busy) => 3,
            Self::Sync(SyncError::Cancelled) => 130,
            Self::Lock(_) | Self::Sync(_) | Self::Io { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use ovr_core::SyncError;

    use super::LauncherError;
    use crate::install_lock::LockError;

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        assert_eq!(
            LauncherError::NotConfigured("settings.json".to_string()).exit_code(),
            2
        );
        assert_eq!(LauncherError::from(LockError::AlreadyRunning).exit_code(), 3);
        assert_eq!(LauncherError::from(SyncError::Cancelled).exit_code(), 130);
        assert_eq!(
            LauncherError::from(SyncError::artifact_not_found("1.0.0.0.zip")).exit_code(),
            1
        );
    }
}

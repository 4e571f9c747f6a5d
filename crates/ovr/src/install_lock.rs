use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another launcher is already updating this installation")]
    AlreadyRunning,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive hold on an install root. Released when dropped.
#[derive(Debug)]
pub struct InstallLock {
    _file: File,
}

impl InstallLock {
    pub fn acquire(lock_file_path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = lock_file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| LockError::io("failed to create install root", error))?;
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_file_path)
            .map_err(|error| LockError::io("failed to open install lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(LockError::AlreadyRunning);
            }
            Err(error) => {
                // Windows reports a held lock as a lock violation rather than WouldBlock.
                if error.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                    return Err(LockError::AlreadyRunning);
                }
                return Err(LockError::io("failed to acquire install lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| LockError::io("failed to write install lock metadata", error))?;

        Ok(Self { _file: lock_file })
    }
}

#[cfg(test)]
mod tests {
    use super::{InstallLock, LockError};

    #[test]
    fn second_acquire_is_refused_until_release() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("update.lock");

        let first = InstallLock::acquire(&path).expect("first lock should be acquired");
        assert!(matches!(
            InstallLock::acquire(&path),
            Err(LockError::AlreadyRunning)
        ));

        drop(first);
        assert!(InstallLock::acquire(&path).is_ok());
    }

    #[test]
    fn lock_file_records_process_id() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("nested/update.lock");

        drop(InstallLock::acquire(&path).expect("lock should be acquired"));

        let contents = std::fs::read_to_string(&path).expect("lock file should be readable");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}

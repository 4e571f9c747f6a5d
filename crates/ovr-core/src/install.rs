//! Streamed artifact download and staged archive extraction.
//!
//! Extraction never touches the live installation until the replacement has
//! been fully unpacked next to it; the swap is a pair of directory renames.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

pub const DEFAULT_CHUNK_SIZE: usize = 80 * 1024;

const STAGING_MARKER: &str = ".staging-";
const BACKUP_MARKER: &str = ".old-";

/// Bytes received so far against the declared artifact size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Zero when the store did not declare a length.
    pub total: u64,
}

impl DownloadProgress {
    /// Completed share in `0.0..=1.0`, or `None` when the total is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.downloaded as f64 / self.total as f64).min(1.0))
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub chunk_size: usize,
    /// Longest wait for a single chunk before giving up.
    pub stall_timeout: Option<Duration>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stall_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Stream `reader` into `dest`, reporting progress after every chunk.
///
/// `on_progress` is called once before the first read and again after each
/// chunk, including when `content_length` is zero (unknown). Any failure
/// removes the partially written file.
///
/// # Errors
/// Returns [`SyncError::DownloadIncomplete`] when a declared length is not
/// reached, [`SyncError::DownloadStalled`] when a read exceeds the stall
/// timeout, [`SyncError::Cancelled`] when `cancel` fires, and
/// [`SyncError::Io`] when the destination cannot be written.
pub async fn download<R, F>(
    reader: &mut R,
    content_length: u64,
    dest: &Path,
    options: &DownloadOptions,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<u64, SyncError>
where
    R: AsyncRead + Unpin + ?Sized,
    F: FnMut(DownloadProgress),
{
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|error| {
            SyncError::io_with_path("failed to create download directory", parent, &error)
        })?;
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        SyncError::io_with_path("failed to create download file", dest, &error)
    })?;

    let result = copy_chunks(
        reader,
        &mut file,
        content_length,
        dest,
        options,
        cancel,
        &mut on_progress,
    )
    .await;
    drop(file);

    match result {
        Ok(downloaded) => {
            info!("Download complete: {downloaded} bytes");
            Ok(downloaded)
        }
        Err(error) => {
            if let Err(remove_error) = tokio::fs::remove_file(dest).await {
                warn!(
                    "Failed to remove partial download {}: {remove_error}",
                    dest.display()
                );
            }
            Err(error)
        }
    }
}

async fn copy_chunks<R, F>(
    reader: &mut R,
    file: &mut tokio::fs::File,
    content_length: u64,
    dest: &Path,
    options: &DownloadOptions,
    cancel: &CancellationToken,
    on_progress: &mut F,
) -> Result<u64, SyncError>
where
    R: AsyncRead + Unpin + ?Sized,
    F: FnMut(DownloadProgress),
{
    let mut buffer = vec![0_u8; options.chunk_size.max(1)];
    let mut downloaded: u64 = 0;

    on_progress(DownloadProgress {
        downloaded,
        total: content_length,
    });

    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            read = read_chunk(reader, &mut buffer, options.stall_timeout) => read?,
        };
        if read == 0 {
            break;
        }

        file.write_all(&buffer[..read]).await.map_err(|error| {
            SyncError::io_with_path("failed to write download data", dest, &error)
        })?;
        downloaded += read as u64;
        on_progress(DownloadProgress {
            downloaded,
            total: content_length,
        });
    }

    file.flush().await.map_err(|error| {
        SyncError::io_with_path("failed to flush download file", dest, &error)
    })?;

    if content_length > 0 && downloaded < content_length {
        return Err(SyncError::DownloadIncomplete {
            received: downloaded,
            expected: content_length,
        });
    }
    if content_length > 0 && downloaded > content_length {
        debug!("Received {downloaded} bytes, more than the declared {content_length}");
    }

    Ok(downloaded)
}

async fn read_chunk<R>(
    reader: &mut R,
    buffer: &mut [u8],
    stall_timeout: Option<Duration>,
) -> Result<usize, SyncError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let read = reader.read(buffer);
    let result = match stall_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| SyncError::DownloadStalled { timeout })?,
        None => read.await,
    };
    result.map_err(|error| SyncError::remote_unavailable_from("artifact stream read", error))
}

/// Replace `target_dir` with the contents of the zip at `archive_path`.
///
/// The archive is unpacked into a staging directory beside the target. Only
/// after every entry is written is the old directory renamed aside, the
/// staging directory renamed into place, and the old one deleted. A failure
/// before the swap leaves the existing installation untouched.
///
/// # Errors
/// Returns [`SyncError::ExtractionError`] for malformed archives, write
/// failures, or a failed swap.
pub fn extract(archive_path: &Path, target_dir: &Path) -> Result<(), SyncError> {
    let parent = parent_dir(target_dir);
    std::fs::create_dir_all(parent).map_err(|error| {
        SyncError::extraction_at("failed to create installation parent", parent, &error)
    })?;

    recover_interrupted_install(target_dir);

    let staging = tempfile::Builder::new()
        .prefix(&sibling_prefix(target_dir, STAGING_MARKER))
        .tempdir_in(parent)
        .map_err(|error| {
            SyncError::extraction_at("failed to create staging directory", parent, &error)
        })?;

    extract_zip(archive_path, staging.path())?;

    let staged = staging.keep();
    swap_into_place(&staged, target_dir)?;

    info!("Installed archive into {}", target_dir.display());
    Ok(())
}

/// Repair what an interrupted install left beside `target_dir`.
///
/// A crash between the two renames of a swap leaves the previous
/// installation only in a backup directory; that backup is moved back into
/// place first. Staging directories are then removed, and backups only once
/// `target_dir` exists again.
pub fn recover_interrupted_install(target_dir: &Path) {
    let staging_prefix = sibling_prefix(target_dir, STAGING_MARKER);
    let backup_prefix = sibling_prefix(target_dir, BACKUP_MARKER);

    let Ok(entries) = std::fs::read_dir(parent_dir(target_dir)) else {
        return;
    };
    let mut staging = Vec::new();
    let mut backups = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&staging_prefix) {
            staging.push(entry.path());
        } else if name.starts_with(&backup_prefix) {
            let modified = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .ok();
            backups.push((modified, entry.path()));
        }
    }

    if !target_dir.exists() {
        backups.sort_by_key(|(modified, _)| *modified);
        if let Some((_, newest)) = backups.pop() {
            match std::fs::rename(&newest, target_dir) {
                Ok(()) => info!(
                    "Restored previous installation from {}",
                    newest.display()
                ),
                Err(error) => {
                    warn!(
                        "Failed to restore previous installation from {}: {error}",
                        newest.display()
                    );
                    backups.push((None, newest));
                }
            }
        }
    }

    let mut stale = staging;
    if target_dir.exists() {
        stale.extend(backups.into_iter().map(|(_, path)| path));
    }
    for path in stale {
        debug!("Cleaning up stale install directory: {}", path.display());
        if let Err(error) = std::fs::remove_dir_all(&path) {
            warn!("Failed to remove {}: {error}", path.display());
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn sibling_prefix(target_dir: &Path, marker: &str) -> String {
    let name = target_dir
        .file_name()
        .map_or_else(|| "install".into(), |name| name.to_string_lossy());
    format!(".{name}{marker}")
}

fn swap_into_place(staged: &Path, target_dir: &Path) -> Result<(), SyncError> {
    let backup = if target_dir.exists() {
        let backup: PathBuf = parent_dir(target_dir).join(format!(
            "{}{}",
            sibling_prefix(target_dir, BACKUP_MARKER),
            std::process::id()
        ));
        if let Err(error) = std::fs::rename(target_dir, &backup) {
            let _ = std::fs::remove_dir_all(staged);
            return Err(SyncError::extraction_at(
                "failed to move previous installation aside",
                target_dir,
                &error,
            ));
        }
        Some(backup)
    } else {
        None
    };

    if let Err(error) = std::fs::rename(staged, target_dir) {
        warn!("Swap failed, restoring previous installation: {error}");
        if let Some(backup) = &backup {
            let _ = std::fs::rename(backup, target_dir);
        }
        let _ = std::fs::remove_dir_all(staged);
        return Err(SyncError::extraction_at(
            "failed to move new installation into place",
            target_dir,
            &error,
        ));
    }

    if let Some(backup) = backup
        && let Err(error) = std::fs::remove_dir_all(&backup)
    {
        warn!(
            "Failed to remove previous installation {}: {error}",
            backup.display()
        );
    }
    Ok(())
}

fn extract_zip(zip_path: &Path, dest: &Path) -> Result<(), SyncError> {
    let file = std::fs::File::open(zip_path)
        .map_err(|error| SyncError::extraction_at("failed to open archive", zip_path, &error))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| SyncError::extraction("failed to read zip archive", error))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| SyncError::extraction("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path: {}", entry.name());
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                SyncError::extraction_at("failed to create extracted directory", &out_path, &error)
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                SyncError::extraction_at("failed to create extracted parent", parent, &error)
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
            SyncError::extraction_at("failed to create extracted file", &out_path, &error)
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            SyncError::extraction_at("failed to extract archive entry", &out_path, &error)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    debug!("Extraction complete to {}", dest.display());
    Ok(())
}

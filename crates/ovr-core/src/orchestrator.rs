use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::catalog::{ArtifactCatalog, ArtifactDescriptor};
use crate::error::SyncError;
use crate::install::{self, DownloadOptions, DownloadProgress};
use crate::layout::InstallLayout;
use crate::marker::MarkerFile;
use crate::version::VersionId;

/// Where the orchestrator is in an update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking,
    UpToDate {
        version: VersionId,
    },
    Updating {
        version: VersionId,
        stage: UpdateStage,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Downloading,
    Extracting,
    Committing,
}

/// Pushed to the shell while a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    State(UpdateState),
    Progress(DownloadProgress),
}

/// How a successful cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    NoRemoteBuilds,
    UpToDate(VersionId),
    Updated { from: VersionId, to: VersionId },
    /// The newest artifact carries no parseable version; nothing was changed.
    MalformedRemote { key: String },
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delay before each attempt at a remote call; the first is usually zero.
    pub retry_delays: Vec<Duration>,
    pub download: DownloadOptions,
    /// Leave the downloaded archive on disk after installing it.
    pub keep_archive: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry_delays: [0, 2, 5].map(Duration::from_secs).to_vec(),
            download: DownloadOptions::default(),
            keep_archive: false,
        }
    }
}

/// Drives one installation from "what is published" to "what is on disk".
pub struct UpdateOrchestrator {
    catalog: Box<dyn ArtifactCatalog>,
    layout: InstallLayout,
    marker: MarkerFile,
    options: SyncOptions,
    state: Mutex<UpdateState>,
    in_flight: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl UpdateOrchestrator {
    pub fn new(catalog: Box<dyn ArtifactCatalog>, layout: InstallLayout, options: SyncOptions) -> Self {
        let marker = MarkerFile::new(layout.marker_file());
        Self {
            catalog,
            layout,
            marker,
            options,
            state: Mutex::new(UpdateState::Idle),
            in_flight: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The recorded version, read without creating a missing marker.
    #[must_use]
    pub fn installed_version(&self) -> VersionId {
        self.marker.current()
    }

    /// Abort the running cycle's download. Issued while no cycle runs, it
    /// cancels the next cycle instead.
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Check the remote store and install its newest build if it differs
    /// from the installed one.
    ///
    /// Any difference triggers an install, including a remote build older
    /// than the local one. The marker file is only advanced after the new
    /// build is fully in place. State transitions are sent on `events` and
    /// the cycle always ends in [`UpdateState::Idle`]; download progress is
    /// sent best-effort and dropped when the receiver lags.
    ///
    /// # Errors
    /// Returns [`SyncError::Busy`] if a cycle is already running, otherwise
    /// the error that moved the cycle to [`UpdateState::Failed`].
    pub async fn check_and_update(
        &self,
        events: &mpsc::Sender<UpdateEvent>,
    ) -> Result<CheckOutcome, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Ignoring update request while another is in flight");
            return Err(SyncError::Busy);
        };
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let result = self.run(events, &cancel).await;
        self.renew_cancel_token();
        if let Err(error) = &result {
            warn!("Update failed: {error}");
            self.transition(
                events,
                UpdateState::Failed {
                    reason: error.to_string(),
                },
            )
            .await;
        }
        self.transition(events, UpdateState::Idle).await;
        result
    }

    async fn run(
        &self,
        events: &mpsc::Sender<UpdateEvent>,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome, SyncError> {
        self.transition(events, UpdateState::Checking).await;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        debug!("Fetching builds from {}", self.catalog.name());

        let Some(descriptor) = self
            .with_retries("list artifacts", || self.catalog.list_latest())
            .await?
        else {
            info!("No builds published in {}", self.catalog.name());
            return Ok(CheckOutcome::NoRemoteBuilds);
        };
        info!("Remote build found: {}", descriptor.key);

        let Some(remote) = descriptor.version else {
            warn!(
                "Remote artifact {} has no parseable version, skipping update",
                descriptor.key
            );
            return Ok(CheckOutcome::MalformedRemote {
                key: descriptor.key,
            });
        };

        let local = self.read_marker().await?;
        if local.is_zero() {
            info!("No build recorded locally");
        }
        info!("Local version {local}, remote version {remote}");

        if !local.differs_from(&remote) {
            self.transition(events, UpdateState::UpToDate { version: local })
                .await;
            return Ok(CheckOutcome::UpToDate(local));
        }

        info!("Local and remote versions differ, updating {local} -> {remote}");
        self.install(events, cancel, &descriptor, remote).await?;

        self.transition(
            events,
            UpdateState::Updating {
                version: remote,
                stage: UpdateStage::Committing,
            },
        )
        .await;
        self.write_marker(remote).await?;

        Ok(CheckOutcome::Updated {
            from: local,
            to: remote,
        })
    }

    async fn install(
        &self,
        events: &mpsc::Sender<UpdateEvent>,
        cancel: &CancellationToken,
        descriptor: &ArtifactDescriptor,
        version: VersionId,
    ) -> Result<(), SyncError> {
        self.transition(
            events,
            UpdateState::Updating {
                version,
                stage: UpdateStage::Downloading,
            },
        )
        .await;

        let mut stream = self
            .with_retries("open artifact", || {
                self.catalog.open_stream(&descriptor.key)
            })
            .await?;
        let total = if stream.content_length > 0 {
            stream.content_length
        } else {
            descriptor.size
        };

        let archive = self.layout.archive_file();
        info!("Downloading {} to {}", descriptor.key, archive.display());
        install::download(
            &mut stream.reader,
            total,
            &archive,
            &self.options.download,
            cancel,
            |progress| {
                let _ = events.try_send(UpdateEvent::Progress(progress));
            },
        )
        .await?;
        drop(stream);

        self.transition(
            events,
            UpdateState::Updating {
                version,
                stage: UpdateStage::Extracting,
            },
        )
        .await;

        let target = self.layout.install_dir();
        let archive_path = archive.clone();
        let extracted = tokio::task::spawn_blocking(move || install::extract(&archive_path, &target))
            .await
            .map_err(|error| SyncError::extraction("extraction task failed", error))
            .and_then(|result| result);

        if !self.options.keep_archive
            && let Err(error) = tokio::fs::remove_file(&archive).await
        {
            warn!("Failed to remove archive {}: {error}", archive.display());
        }

        extracted
    }

    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut last_error = None;

        for (index, delay) in self.options.retry_delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }

            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => {
                    warn!("{operation} failed (attempt {}): {error}", index + 1);
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => attempt().await,
        }
    }

    async fn transition(&self, events: &mpsc::Sender<UpdateEvent>, next: UpdateState) {
        debug!("Update state -> {next:?}");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next.clone();
        let _ = events.send(UpdateEvent::State(next)).await;
    }

    async fn read_marker(&self) -> Result<VersionId, SyncError> {
        let marker = self.marker.clone();
        tokio::task::spawn_blocking(move || marker.read())
            .await
            .map_err(|error| SyncError::io("version marker task failed", std::io::Error::other(error)))
    }

    async fn write_marker(&self, version: VersionId) -> Result<(), SyncError> {
        let marker = self.marker.clone();
        tokio::task::spawn_blocking(move || marker.write(version))
            .await
            .map_err(|error| SyncError::persistence(self.marker.path(), std::io::Error::other(error)))
            .and_then(|result| result)
    }

    fn renew_cancel_token(&self) {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
    }
}

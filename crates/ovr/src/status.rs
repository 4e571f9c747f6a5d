use log::{info, warn};
use ovr_core::{DownloadProgress, UpdateEvent, UpdateStage, UpdateState};
use tokio::sync::mpsc;

const MIB: f64 = 1024.0 * 1024.0;

/// Percentage points between two printed progress lines.
const PROGRESS_STEP: u32 = 10;

pub fn state_label(state: &UpdateState) -> String {
    match state {
        UpdateState::Idle => "Ready".to_string(),
        UpdateState::Checking => "Checking for updates".to_string(),
        UpdateState::UpToDate { version } => format!("Up to date ({version})"),
        UpdateState::Updating {
            version,
            stage: UpdateStage::Downloading,
        } => format!("Downloading {version}"),
        UpdateState::Updating {
            version,
            stage: UpdateStage::Extracting,
        } => format!("Installing {version}"),
        UpdateState::Updating {
            version,
            stage: UpdateStage::Committing,
        } => format!("Finishing {version}"),
        UpdateState::Failed { reason } => format!("Update failed: {reason}"),
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn format_progress(progress: &DownloadProgress) -> String {
    let downloaded = progress.downloaded as f64 / MIB;
    match progress.fraction() {
        Some(fraction) => format!(
            "{downloaded:.1} / {:.1} MiB ({:.0}%)",
            progress.total as f64 / MIB,
            fraction * 100.0
        ),
        None => format!("{downloaded:.1} MiB"),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn progress_bucket(progress: &DownloadProgress) -> Option<u32> {
    progress
        .fraction()
        .map(|fraction| (fraction * 100.0) as u32 / PROGRESS_STEP)
}

/// Drain `events` until every sender is gone, printing state changes and
/// progress in coarse steps.
pub async fn report(mut events: mpsc::Receiver<UpdateEvent>) {
    let mut last_bucket = None;

    while let Some(event) = events.recv().await {
        match event {
            UpdateEvent::State(state) => {
                last_bucket = None;
                let label = state_label(&state);
                if matches!(state, UpdateState::Failed { .. }) {
                    warn!("{label}");
                } else {
                    info!("{label}");
                }
                println!("{label}");
            }
            UpdateEvent::Progress(progress) => {
                let bucket = progress_bucket(&progress);
                if bucket.is_some() && bucket == last_bucket {
                    continue;
                }
                last_bucket = bucket;
                let line = format_progress(&progress);
                log::debug!("Download progress: {line}");
                println!("  {line}");
            }
        }
    }
}

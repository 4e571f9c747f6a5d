mod error;
mod install_lock;
mod logging;
mod settings;
mod status;

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use ovr_core::{CheckOutcome, UpdateOrchestrator};
use ovr_remote::catalog_from_config;

use crate::error::LauncherError;
use crate::install_lock::InstallLock;
use crate::settings::LauncherSettings;

const EVENT_BUFFER: usize = 32;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = LauncherSettings::load();
    if let Some(log_path) = logging::init_logging(settings.debug_logging, settings.max_log_size_bytes)
    {
        info!("Logging to {}", log_path.display());
    }
    info!("ovr-launcher {} starting", env!("CARGO_PKG_VERSION"));
    match LauncherSettings::write_template_if_missing() {
        Ok(Some(path)) => info!("Wrote default settings to {}", path.display()),
        Ok(None) => {}
        Err(error) => warn!("Could not write default settings: {error}"),
    }

    match run(&settings).await {
        Ok(outcome) => {
            info!("Update cycle finished: {outcome:?}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{error}");
            eprintln!("{error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(settings: &LauncherSettings) -> Result<CheckOutcome, LauncherError> {
    let Some(remote) = &settings.remote else {
        let location = LauncherSettings::settings_path()
            .map_or_else(|_| "the settings file".to_string(), |path| path.display().to_string());
        return Err(LauncherError::NotConfigured(location));
    };

    let layout = settings.install_layout();
    std::fs::create_dir_all(layout.root())
        .map_err(|source| LauncherError::io("failed to create install root", source))?;
    let _lock = InstallLock::acquire(&layout.lock_file())?;
    info!("Install root: {}", layout.root().display());

    let catalog = catalog_from_config(remote, settings.http_timeout())?;
    let orchestrator = Arc::new(UpdateOrchestrator::new(
        catalog,
        layout,
        settings.sync_options(),
    ));

    let (events, receiver) = tokio::sync::mpsc::channel(EVENT_BUFFER);
    let reporter = tokio::spawn(status::report(receiver));

    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling update");
                orchestrator.cancel();
            }
        })
    };

    let result = orchestrator.check_and_update(&events).await;
    interrupt.abort();
    drop(events);
    if let Err(error) = reporter.await {
        warn!("Status reporter stopped unexpectedly: {error}");
    }

    let outcome = result?;
    let layout = orchestrator.layout();
    if layout.is_installed() {
        info!(
            "Installed build {} ready at {}",
            orchestrator.installed_version(),
            layout.executable().display()
        );
    } else {
        warn!(
            "No client executable found at {}",
            layout.executable().display()
        );
    }

    Ok(outcome)
}

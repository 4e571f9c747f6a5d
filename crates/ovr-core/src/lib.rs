//! Core update logic for the Override launcher.
//!
//! This crate is independent of any UI and of the concrete remote store:
//! - Four-component build identifiers and their two textual conventions.
//! - The local version marker file.
//! - Streamed archive download and staged extraction.
//! - The update orchestrator state machine and its status events.

mod catalog;
mod error;
pub mod install;
mod layout;
mod marker;
mod orchestrator;
mod version;

/// Remote store seam and the artifact descriptor it yields.
pub use catalog::{ArtifactCatalog, ArtifactDescriptor, ArtifactStream};
/// Update failure taxonomy.
pub use error::SyncError;
/// On-disk paths of an installation.
pub use layout::InstallLayout;
/// Persisted record of the installed build.
pub use marker::MarkerFile;
/// Download tuning and the progress it reports.
pub use install::{DownloadOptions, DownloadProgress};
/// Update state machine, its configuration, and the events it emits.
pub use orchestrator::{
    CheckOutcome, SyncOptions, UpdateEvent, UpdateOrchestrator, UpdateStage, UpdateState,
};
/// Build identifier and its strict parse error.
pub use version::{VersionComponent, VersionId, VersionParseError};

//! Install orchestration for Sideport.
//!
//! This crate is transport-agnostic; it drives any
//! [`sideport_device::DeviceSession`]:
//! - Release manifest parsing and bundle file resolution.
//! - Release feed lookup for the newest installable package.
//! - Local and streamed HTTP byte sources with cancellation.
//! - The install state machine and its event stream.

mod bundle;
mod error;
mod events;
mod install;
mod manifest;
mod progress;
mod release;
mod source;

/// Selected bundle files and manifest path resolution.
pub use bundle::{FileResolutionError, FileSet, SelectedFile, base_name, select_folder};
pub use error::InstallError;
pub use events::{EventSink, InstallEvent, InstallState};
/// Orchestrator entry points and the remote path helpers it relies on.
pub use install::{
    InstallOptions, InstallOutcome, Installer, PackageSource, output_indicates_success,
    remote_package_path, sanitize_file_name,
};
pub use manifest::{
    DATA_EXTENSION, MANIFEST_FILE_NAME, ManifestFormatError, ManifestInfo, PACKAGE_EXTENSION,
    has_suffix_ignore_case, normalize_manifest_path, parse_manifest,
};
pub use progress::ProgressReporter;
/// Release feed model and resolver.
pub use release::{
    DEFAULT_FEED_BASE_URL, InstallableAsset, ReleaseAsset, ReleaseCandidate, ReleaseResolutionError,
    ReleaseResolver, parse_repo_ref, select_installable,
};
pub use source::{
    CancellableSource, DEFAULT_CHUNK_SIZE, DownloadError, FileSource, HttpSource,
    file_name_from_url, streaming_client,
};

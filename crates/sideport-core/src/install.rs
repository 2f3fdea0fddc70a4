//! Install orchestration.
//!
//! One attempt walks `PreparingSource -> Transferring -> Installing ->
//! CleaningUp -> Done`, or lands in `Failed` with the originating error.
//! Nothing is retried; a caller starts a fresh attempt instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use sideport_device::{
    ByteSource, DeviceConnector, DeviceInfo, DeviceSelector, DeviceSession, TransferProgress,
};
use tokio_util::sync::CancellationToken;

use crate::bundle::{FileSet, SelectedFile, base_name};
use crate::error::InstallError;
use crate::events::{EventSink, InstallEvent, InstallState};
use crate::manifest::parse_manifest;
use crate::progress::ProgressReporter;
use crate::release::{DEFAULT_FEED_BASE_URL, ReleaseResolver};
use crate::source::{
    CancellableSource, DEFAULT_CHUNK_SIZE, FileSource, HttpSource, file_name_from_url,
};

const FALLBACK_PACKAGE_NAME: &str = "package.apk";

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub remote_temp_dir: String,
    pub auxiliary_data_root: String,
    pub success_token: String,
    pub release_feed_base_url: String,
    pub chunk_size: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            remote_temp_dir: "/data/local/tmp".to_string(),
            auxiliary_data_root: "/sdcard/Android/obb".to_string(),
            success_token: "Success".to_string(),
            release_feed_base_url: DEFAULT_FEED_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Where the package bytes of a single-package install come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    LocalFile(PathBuf),
    Url(String),
    Release { owner: String, repo: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub package_remote_path: String,
    /// Verbatim output of the remote install command.
    pub output: String,
    /// Advisory only: the output contained the configured success token.
    pub success_detected: bool,
    pub auxiliary_remote_paths: Vec<String>,
}

struct PreparedPackage {
    file_name: String,
    source: Box<dyn ByteSource>,
}

struct PreparedBundle {
    package: PreparedPackage,
    package_name: String,
    auxiliary_files: Vec<(String, PathBuf)>,
}

/// Owns the single live device session and drives install attempts on it.
pub struct Installer {
    connector: Arc<dyn DeviceConnector>,
    session: Option<Box<dyn DeviceSession>>,
    http: reqwest::Client,
    releases: ReleaseResolver,
    options: InstallOptions,
    events: EventSink,
}

impl Installer {
    #[must_use]
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        http: reqwest::Client,
        options: InstallOptions,
        events: EventSink,
    ) -> Self {
        let releases = ReleaseResolver::new(http.clone(), options.release_feed_base_url.clone());
        Self {
            connector,
            session: None,
            http,
            releases,
            options,
            events,
        }
    }

    /// Resolve releases through `releases` instead of the download client.
    #[must_use]
    pub fn with_releases(mut self, releases: ReleaseResolver) -> Self {
        self.releases = releases;
        self
    }

    #[must_use]
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.session.as_deref().map(|session| session.device())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open a session to the selected device, releasing any previous one
    /// first.
    ///
    /// # Errors
    /// Returns a connection error when the device cannot be opened or
    /// authorized; no session is kept in that case.
    pub async fn connect(&mut self, selector: &DeviceSelector) -> Result<DeviceInfo, InstallError> {
        self.disconnect().await;

        info!("Connecting to {selector} via {}", self.connector.name());
        let events = self.events.clone();
        let on_auth_pending = move || {
            events.log("Waiting for authorization: accept the USB debugging prompt on the headset");
        };

        let session = self.connector.connect(selector, &on_auth_pending).await?;
        let info = session.device().clone();
        self.events
            .log(format!("Connected to {}", info.display_name()));
        self.session = Some(session);
        Ok(info)
    }

    /// Release the live session, if any. Never fails.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Releasing session to {}", session.device().serial);
            session.disconnect().await;
        }
    }

    /// Install one package file.
    ///
    /// # Errors
    /// Returns the first fatal error of the attempt; see [`InstallError`].
    pub async fn install_package(
        &self,
        source: &PackageSource,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError> {
        let result = self.run_package(source, cancel).await;
        self.finish(result)
    }

    /// Install a bundle folder: its package file, then every data file the
    /// manifest lists, in manifest order.
    ///
    /// # Errors
    /// Returns the first fatal error of the attempt; see [`InstallError`].
    pub async fn install_bundle(
        &self,
        files: Vec<SelectedFile>,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError> {
        let result = self.run_bundle(files, cancel).await;
        self.finish(result)
    }

    async fn run_package(
        &self,
        source: &PackageSource,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError> {
        self.events.state(InstallState::PreparingSource);
        let package = self.prepare_package(source).await?;
        let session = self.require_session()?;
        self.install_prepared(session, package, cancel).await
    }

    async fn run_bundle(
        &self,
        files: Vec<SelectedFile>,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError> {
        self.events.state(InstallState::PreparingSource);
        let bundle = self.prepare_bundle(files).await?;
        let session = self.require_session()?;

        let mut outcome = self.install_prepared(session, bundle.package, cancel).await?;
        outcome.auxiliary_remote_paths = self
            .push_auxiliary_files(session, &bundle.package_name, &bundle.auxiliary_files, cancel)
            .await?;
        Ok(outcome)
    }

    fn finish(
        &self,
        result: Result<InstallOutcome, InstallError>,
    ) -> Result<InstallOutcome, InstallError> {
        match &result {
            Ok(_) => self.events.state(InstallState::Done),
            Err(error) => {
                warn!("Install attempt failed [{}]: {error}", error.kind());
                self.events.log(format!("{}: {error}", error.kind()));
                self.events.state(InstallState::Failed);
            }
        }
        result
    }

    fn require_session(&self) -> Result<&dyn DeviceSession, InstallError> {
        self.session.as_deref().ok_or(InstallError::NotConnected)
    }

    async fn prepare_package(&self, source: &PackageSource) -> Result<PreparedPackage, InstallError> {
        match source {
            PackageSource::LocalFile(path) => self.open_local(path).await,
            PackageSource::Url(url) => {
                let file_name = file_name_from_url(url).unwrap_or(FALLBACK_PACKAGE_NAME);
                self.open_remote(url, file_name).await
            }
            PackageSource::Release { owner, repo } => {
                let asset = self.releases.resolve_installable(owner, repo).await?;
                self.events.log(format!(
                    "Resolved {owner}/{repo} {} to {}",
                    asset.tag_name, asset.name
                ));
                self.open_remote(&asset.download_url, &asset.name).await
            }
        }
    }

    async fn prepare_bundle(&self, files: Vec<SelectedFile>) -> Result<PreparedBundle, InstallError> {
        let file_set = FileSet::build(files);
        debug!("Bundle selection holds {} files", file_set.len());

        let manifest_file = file_set.manifest_file()?;
        let text = tokio::fs::read_to_string(&manifest_file.path)
            .await
            .map_err(|error| InstallError::local_file(&manifest_file.path, error))?;
        let manifest = parse_manifest(&text)?;
        self.events.log(format!(
            "Bundle {} version {}",
            manifest.package_name, manifest.version_code
        ));

        let package_file = file_set.resolve_required(&manifest.package_file_path)?;
        let auxiliary_files = manifest
            .auxiliary_file_paths
            .iter()
            .map(|manifest_path| {
                file_set
                    .resolve_required(manifest_path)
                    .map(|file| (manifest_path.clone(), file.path.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let package = self.open_local(&package_file.path).await?;
        Ok(PreparedBundle {
            package,
            package_name: manifest.package_name,
            auxiliary_files,
        })
    }

    async fn open_local(&self, path: &Path) -> Result<PreparedPackage, InstallError> {
        let source = FileSource::open(path, self.options.chunk_size)
            .await
            .map_err(|error| InstallError::local_file(path, error))?;
        let file_name = path
            .file_name()
            .map_or_else(|| FALLBACK_PACKAGE_NAME.to_string(), |name| name.to_string_lossy().into_owned());
        Ok(PreparedPackage {
            file_name,
            source: Box::new(source),
        })
    }

    async fn open_remote(&self, url: &str, file_name: &str) -> Result<PreparedPackage, InstallError> {
        info!("Streaming package from {url}");
        let source = HttpSource::open(&self.http, url).await?;
        Ok(PreparedPackage {
            file_name: file_name.to_string(),
            source: Box::new(source),
        })
    }

    async fn install_prepared(
        &self,
        session: &dyn DeviceSession,
        package: PreparedPackage,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, InstallError> {
        self.events.state(InstallState::Transferring);
        let remote_path = remote_package_path(
            &self.options.remote_temp_dir,
            chrono::Utc::now().timestamp_millis(),
            &package.file_name,
        );
        self.events
            .log(format!("Pushing {} to {remote_path}", package.file_name));

        let mut source = CancellableSource::new(package.source, cancel.clone());
        let mut reporter = ProgressReporter::new(package.file_name, self.events.clone());
        let pushed = session
            .push_file(&remote_path, &mut source, &mut |progress: TransferProgress| {
                reporter.on_progress(progress);
            })
            .await;
        if let Err(error) = pushed {
            self.remove_remote(session, &remote_path).await;
            return Err(InstallError::from_push(error));
        }

        self.events.state(InstallState::Installing);
        let installed = session
            .run_command(&["pm", "install", "-r", &remote_path])
            .await;

        self.events.state(InstallState::CleaningUp);
        self.remove_remote(session, &remote_path).await;

        let output = installed?;
        let success_detected = output_indicates_success(&output, &self.options.success_token);
        self.events.emit(InstallEvent::Output(output.clone()));
        if success_detected {
            self.events.log("Install succeeded");
        } else {
            warn!("Install output did not contain {:?}", self.options.success_token);
            self.events.log("Install may have failed; check the output above");
        }

        Ok(InstallOutcome {
            package_remote_path: remote_path,
            output,
            success_detected,
            auxiliary_remote_paths: Vec::new(),
        })
    }

    async fn push_auxiliary_files(
        &self,
        session: &dyn DeviceSession,
        package_name: &str,
        files: &[(String, PathBuf)],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, InstallError> {
        let aux_dir = format!(
            "{}/{package_name}",
            self.options.auxiliary_data_root.trim_end_matches('/')
        );
        self.events.log(format!("Preparing {aux_dir}"));
        session.run_command(&["mkdir", "-p", &aux_dir]).await?;

        let mut pushed = Vec::with_capacity(files.len());
        for (manifest_path, local_path) in files {
            let file_name = base_name(manifest_path);
            let remote_path = format!("{aux_dir}/{file_name}");
            self.events.state(InstallState::Transferring);
            self.events.log(format!("Pushing {file_name} to {remote_path}"));

            let file = FileSource::open(local_path, self.options.chunk_size)
                .await
                .map_err(|error| InstallError::local_file(local_path, error))?;
            let mut source = CancellableSource::new(Box::new(file), cancel.clone());
            let mut reporter = ProgressReporter::new(file_name, self.events.clone());
            session
                .push_file(&remote_path, &mut source, &mut |progress: TransferProgress| {
                    reporter.on_progress(progress);
                })
                .await
                .map_err(InstallError::from_push)?;
            pushed.push(remote_path);
        }

        self.events
            .log(format!("Copied {} data file(s) to {aux_dir}", pushed.len()));
        Ok(pushed)
    }

    async fn remove_remote(&self, session: &dyn DeviceSession, remote_path: &str) {
        if let Err(error) = session.run_command(&["rm", "-f", remote_path]).await {
            warn!("Failed to remove {remote_path}: {error}");
            self.events
                .log(format!("Could not remove temporary file {remote_path}: {error}"));
        }
    }
}

/// Replace everything outside `[A-Za-z0-9._-]` so the name is inert in a
/// remote shell and cannot escape the temp directory.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        FALLBACK_PACKAGE_NAME.to_string()
    } else {
        sanitized
    }
}

#[must_use]
pub fn remote_package_path(temp_dir: &str, timestamp_millis: i64, file_name: &str) -> String {
    format!(
        "{}/{timestamp_millis}_{}",
        temp_dir.trim_end_matches('/'),
        sanitize_file_name(file_name)
    )
}

#[must_use]
pub fn output_indicates_success(output: &str, token: &str) -> bool {
    !token.is_empty()
        && output
            .to_ascii_lowercase()
            .contains(&token.to_ascii_lowercase())
}

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use sideport_adb::{AdbClient, AdbConnector, locate_adb};
use sideport_core::{
    EventSink, InstallError, Installer, PackageSource, ReleaseResolver, SelectedFile,
    parse_manifest, parse_repo_ref, select_folder, streaming_client,
};
use sideport_device::{DeviceConnector, DeviceSelector};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::{BundleArgs, Cli, Commands, ConfigArgs, InstallArgs, ManifestArgs, ReleaseArgs};
use crate::error::AppError;
use crate::render;
use crate::settings::Settings;

struct Context {
    settings: Settings,
    selector: DeviceSelector,
    adb_override: Option<std::path::PathBuf>,
    feed_http: reqwest::Client,
    download_http: reqwest::Client,
}

impl Context {
    fn new(cli: &Cli, settings: Settings) -> Self {
        let timeout = Duration::from_secs(settings.http_timeout_secs);
        let feed_http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("sideport/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|error| {
                warn!("Falling back to a default release feed client: {error}");
                reqwest::Client::default()
            });
        let download_http = streaming_client(timeout, timeout).unwrap_or_else(|error| {
            warn!("Falling back to a default download client: {error}");
            reqwest::Client::default()
        });
        let selector =
            DeviceSelector::from_serial(cli.serial.clone().or_else(|| settings.device_serial.clone()));
        let adb_override = cli.adb.clone().or_else(|| settings.adb_path.clone());
        Self {
            settings,
            selector,
            adb_override,
            feed_http,
            download_http,
        }
    }

    fn connector(&self) -> Result<Arc<dyn DeviceConnector>, AppError> {
        let adb_path = locate_adb(self.adb_override.as_deref())?;
        info!("Using adb at {}", adb_path.display());
        let connector = AdbConnector::new(AdbClient::new(adb_path))
            .with_auth_timeout(Duration::from_secs(self.settings.auth_timeout_secs));
        Ok(Arc::new(connector))
    }

    fn release_resolver(&self) -> ReleaseResolver {
        ReleaseResolver::new(
            self.feed_http.clone(),
            self.settings.release_feed_base_url.clone(),
        )
    }
}

pub async fn run(cli: Cli, settings: Settings) -> Result<(), AppError> {
    let context = Context::new(&cli, settings);
    match cli.command {
        Commands::Devices => list_devices(&context).await,
        Commands::Install(args) => install(&context, &args).await,
        Commands::Bundle(args) => bundle(&context, &args).await,
        Commands::Release(args) => release(&context, &args).await,
        Commands::Manifest(args) => manifest(&args).await,
        Commands::Config(args) => config(&context, &args),
    }
}

async fn list_devices(context: &Context) -> Result<(), AppError> {
    let devices = context.connector()?.list_devices().await?;
    println!("{}", render::device_table(&devices));
    Ok(())
}

/// Pick the single-package source: explicit arguments first, then the
/// `download_url` and `default_release` settings.
fn package_source(args: &InstallArgs, settings: &Settings) -> Result<PackageSource, AppError> {
    if let Some(file) = &args.file {
        return Ok(PackageSource::LocalFile(file.clone()));
    }
    if let Some(url) = &args.url {
        return Ok(PackageSource::Url(url.clone()));
    }
    if let Some(reference) = &args.release {
        return release_source(reference);
    }
    if let Some(url) = &settings.download_url {
        return Ok(PackageSource::Url(url.clone()));
    }
    if let Some(reference) = &settings.default_release {
        return release_source(reference);
    }
    Err(AppError::usage(
        "no package source: pass FILE, --url or --release, or set download_url/default_release",
    ))
}

fn release_source(reference: &str) -> Result<PackageSource, AppError> {
    let (owner, repo) = parse_repo_ref(reference)
        .ok_or_else(|| AppError::usage(format!("`{reference}` is not an OWNER/REPO reference")))?;
    Ok(PackageSource::Release {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

async fn install(context: &Context, args: &InstallArgs) -> Result<(), AppError> {
    let source = package_source(args, &context.settings)?;
    run_attempt(context, Attempt::Package(source)).await
}

async fn bundle(context: &Context, args: &BundleArgs) -> Result<(), AppError> {
    let files =
        select_folder(&args.dir).map_err(|e| AppError::folder_unreadable(&args.dir, e))?;
    info!("Selected {} files under {}", files.len(), args.dir.display());
    run_attempt(context, Attempt::Bundle(files)).await
}

enum Attempt {
    Package(PackageSource),
    Bundle(Vec<SelectedFile>),
}

/// Connect, run one install attempt with Ctrl-C wired to cancellation, and
/// print its events and outcome.
async fn run_attempt(context: &Context, attempt: Attempt) -> Result<(), AppError> {
    let connector = context.connector()?;
    let (sink, events) = EventSink::channel();
    let printer = render::spawn_printer(events);

    let result = {
        let mut installer = Installer::new(
            connector,
            context.download_http.clone(),
            context.settings.install_options(),
            sink,
        )
        .with_releases(context.release_resolver());
        let result = match installer.connect(&context.selector).await {
            Ok(_) => {
                let cancel = CancellationToken::new();
                let interrupt = cancel_on_ctrl_c(cancel.clone());
                let result = match attempt {
                    Attempt::Package(source) => installer.install_package(&source, &cancel).await,
                    Attempt::Bundle(files) => installer.install_bundle(files, &cancel).await,
                };
                interrupt.abort();
                result
            }
            Err(error) => Err(error),
        };
        installer.disconnect().await;
        result
    };

    if let Err(error) = printer.await {
        warn!("Event printer stopped early: {error}");
    }

    let outcome = result?;
    println!("{}", render::outcome_summary(&outcome));
    Ok(())
}

fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling transfer");
            cancel.cancel();
        }
    })
}

async fn release(context: &Context, args: &ReleaseArgs) -> Result<(), AppError> {
    let (owner, repo) = parse_repo_ref(&args.repo)
        .ok_or_else(|| AppError::usage(format!("`{}` is not an OWNER/REPO reference", args.repo)))?;
    let asset = context
        .release_resolver()
        .resolve_installable(owner, repo)
        .await
        .map_err(InstallError::from)?;

    println!("Release: {}", asset.tag_name);
    println!("Asset:   {} ({} bytes)", asset.name, asset.size);
    println!("URL:     {}", asset.download_url);
    Ok(())
}

async fn manifest(args: &ManifestArgs) -> Result<(), AppError> {
    let text = read_manifest(&args.file).await?;
    let manifest = parse_manifest(&text).map_err(InstallError::from)?;
    println!("{}", render::manifest_summary(&manifest));
    Ok(())
}

async fn read_manifest(path: &Path) -> Result<String, InstallError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|error| InstallError::local_file(path, error))
}

fn config(context: &Context, args: &ConfigArgs) -> Result<(), AppError> {
    if args.write {
        let path = context.settings.save().map_err(AppError::SettingsWriteFailed)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    let json = serde_json::to_string_pretty(&context.settings)
        .map_err(|e| AppError::usage(e.to_string()))?;
    println!("{json}");
    Ok(())
}

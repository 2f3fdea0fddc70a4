//! CLI definitions using clap derive API

use std::path::PathBuf;

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};

/// Sideport - install packages and their data files on an attached headset
#[derive(Parser, Debug)]
#[command(
    name = "sideport",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Sideload packages and data bundles onto an attached headset",
    after_help = "Examples:\n    \
                  sideport devices\n    \
                  sideport install ./game.apk\n    \
                  sideport install --release acme/game\n    \
                  sideport bundle ./MyGame\n    \
                  sideport manifest ./MyGame/release.manifest"
)]
pub struct Cli {
    /// Serial of the device to use when several are attached
    #[arg(long, short = 's', global = true, env = "SIDEPORT_SERIAL")]
    pub serial: Option<String>,

    /// Path to the adb executable (defaults to settings, then PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List attached devices
    Devices,

    /// Install a single package file
    Install(InstallArgs),

    /// Install a bundle folder described by its release.manifest
    Bundle(BundleArgs),

    /// Show the newest installable release of a repository
    Release(ReleaseArgs),

    /// Parse a release.manifest and print what it declares
    Manifest(ManifestArgs),

    /// Show the effective settings, or write them to the settings file
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Args, Debug, Default)]
#[command(after_help = "With no source, the download_url and then default_release settings are used.")]
pub struct InstallArgs {
    /// Local package file
    #[arg(conflicts_with_all = ["url", "release"])]
    pub file: Option<PathBuf>,

    /// Download the package from this URL
    #[arg(long, conflicts_with = "release")]
    pub url: Option<String>,

    /// Install the newest release asset of OWNER/REPO
    #[arg(long, value_name = "OWNER/REPO")]
    pub release: Option<String>,
}

#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Bundle folder containing release.manifest
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Repository reference
    #[arg(value_name = "OWNER/REPO")]
    pub repo: String,
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest file to parse
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the effective settings to the settings file
    #[arg(long)]
    pub write: bool,
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sideport_core::{DEFAULT_CHUNK_SIZE, DEFAULT_FEED_BASE_URL, InstallOptions};
use sideport_platform::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub adb_path: Option<PathBuf>,

    #[serde(default)]
    pub device_serial: Option<String>,

    #[serde(default = "default_remote_temp_dir")]
    pub remote_temp_dir: String,

    #[serde(default = "default_auxiliary_data_root")]
    pub auxiliary_data_root: String,

    #[serde(default = "default_success_token")]
    pub install_success_token: String,

    #[serde(default = "default_release_feed_base_url")]
    pub release_feed_base_url: String,

    /// `owner/repo` used by `install` when no source is given.
    #[serde(default)]
    pub default_release: Option<String>,

    #[serde(default)]
    pub download_url: Option<String>,

    /// Whole-request limit for release feed calls; for downloads it bounds
    /// connecting and each body read instead.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    #[serde(default = "default_chunk_size")]
    pub transfer_chunk_size: usize,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_remote_temp_dir() -> String {
    "/data/local/tmp".to_string()
}

fn default_auxiliary_data_root() -> String {
    "/sdcard/Android/obb".to_string()
}

fn default_success_token() -> String {
    "Success".to_string()
}

fn default_release_feed_base_url() -> String {
    DEFAULT_FEED_BASE_URL.to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_auth_timeout() -> u64 {
    120
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adb_path: None,
            device_serial: None,
            remote_temp_dir: default_remote_temp_dir(),
            auxiliary_data_root: default_auxiliary_data_root(),
            install_success_token: default_success_token(),
            release_feed_base_url: default_release_feed_base_url(),
            default_release: None,
            download_url: None,
            http_timeout_secs: default_http_timeout(),
            auth_timeout_secs: default_auth_timeout(),
            transfer_chunk_size: default_chunk_size(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;

        let path = paths.settings_file();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            remote_temp_dir: self.remote_temp_dir.clone(),
            auxiliary_data_root: self.auxiliary_data_root.clone(),
            success_token: self.install_success_token.clone(),
            release_feed_base_url: self.release_feed_base_url.clone(),
            chunk_size: self.transfer_chunk_size,
        }
    }
}

use std::path::PathBuf;

use sideport_device::DeviceError;
use thiserror::Error;

use crate::bundle::FileResolutionError;
use crate::manifest::ManifestFormatError;
use crate::release::ReleaseResolutionError;
use crate::source::DownloadError;

/// Everything that can end an install attempt.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("No device connected; connect a headset and try again")]
    NotConnected,

    #[error(transparent)]
    Manifest(#[from] ManifestFormatError),

    #[error(transparent)]
    FileResolution(#[from] FileResolutionError),

    #[error(transparent)]
    Release(#[from] ReleaseResolutionError),

    #[error("failed to read {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Install cancelled")]
    Cancelled,
}

impl InstallError {
    pub fn local_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalFile {
            path: path.into(),
            source,
        }
    }

    /// Map a failed push, keeping cancellation distinct from transport errors.
    #[must_use]
    pub fn from_push(error: DeviceError) -> Self {
        match error {
            DeviceError::Cancelled { .. } => Self::Cancelled,
            other => Self::Device(other),
        }
    }

    /// Name of the failure family shown next to the message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "NotConnectedError",
            Self::Manifest(_) => "ManifestFormatError",
            Self::FileResolution(_) => "FileResolutionError",
            Self::Release(_) => "ReleaseResolutionError",
            Self::LocalFile { .. } | Self::Download(_) => "SourceError",
            Self::Device(error) => error.kind(),
            Self::Cancelled => "Cancelled",
        }
    }
}

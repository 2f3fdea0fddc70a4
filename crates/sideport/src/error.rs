use sideport_adb::AdbError;
use sideport_core::InstallError;
use sideport_device::DeviceError;

#[derive(Debug)]
pub enum AppError {
    Usage(String),
    AdbUnavailable(AdbError),
    Device(DeviceError),
    Install(InstallError),
    FolderUnreadable {
        path: String,
        details: String,
    },
    SettingsWriteFailed(std::io::Error),
}

impl AppError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn folder_unreadable(path: &std::path::Path, details: impl ToString) -> Self {
        Self::FolderUnreadable {
            path: path.display().to_string(),
            details: details.to_string(),
        }
    }

    /// Failure family printed in front of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "UsageError",
            Self::AdbUnavailable(_) => "ConnectionError",
            Self::Device(error) => error.kind(),
            Self::Install(error) => error.kind(),
            Self::FolderUnreadable { .. } => "SourceError",
            Self::SettingsWriteFailed(_) => "SettingsError",
        }
    }
}

impl From<AdbError> for AppError {
    fn from(value: AdbError) -> Self {
        Self::AdbUnavailable(value)
    }
}

impl From<DeviceError> for AppError {
    fn from(value: DeviceError) -> Self {
        Self::Device(value)
    }
}

impl From<InstallError> for AppError {
    fn from(value: InstallError) -> Self {
        Self::Install(value)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::AdbUnavailable(error) => write!(f, "{error}"),
            Self::Device(error) => write!(f, "{error}"),
            Self::Install(error) => write!(f, "{error}"),
            Self::FolderUnreadable { path, details } => {
                write!(f, "Could not read bundle folder {path}: {details}")
            }
            Self::SettingsWriteFailed(error) => write!(f, "Failed to write settings: {error}"),
        }
    }
}

impl std::error::Error for AppError {}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Connection failed ({stage}): {details}")]
    Connection {
        stage: &'static str,
        details: String,
    },

    #[error("Command `{command}` failed: {details}")]
    Command { command: String, details: String },

    #[error("Transfer to {remote_path} failed: {details}")]
    Transfer {
        remote_path: String,
        details: String,
    },

    #[error("Transfer to {remote_path} was cancelled")]
    Cancelled { remote_path: String },
}

/// Failure raised by a [`crate::ByteSource`] while producing the next chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("read cancelled")]
    Cancelled,
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Read(err.to_string())
    }
}

impl DeviceError {
    pub fn connection(stage: &'static str, details: impl Into<String>) -> Self {
        Self::Connection {
            stage,
            details: details.into(),
        }
    }

    pub fn command(argv: &[&str], details: impl Into<String>) -> Self {
        Self::Command {
            command: argv.join(" "),
            details: details.into(),
        }
    }

    pub fn transfer(remote_path: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Transfer {
            remote_path: remote_path.into(),
            details: details.into(),
        }
    }

    /// Map a failed source read into the error a push reports.
    pub fn from_source(remote_path: impl Into<String>, error: SourceError) -> Self {
        match error {
            SourceError::Read(details) => Self::Transfer {
                remote_path: remote_path.into(),
                details,
            },
            SourceError::Cancelled => Self::Cancelled {
                remote_path: remote_path.into(),
            },
        }
    }

    /// Name of the error family, reported next to the message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::Command { .. } => "CommandError",
            Self::Transfer { .. } | Self::Cancelled { .. } => "TransferError",
        }
    }
}

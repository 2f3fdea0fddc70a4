use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AdbError {
    #[error("adb not found; install Android platform-tools or set adb_path")]
    NotFound,

    #[error("adb {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for AdbError {
    fn from(err: std::io::Error) -> Self {
        AdbError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::AdbError;

    #[test]
    fn io_error_conversion_maps_to_io_variant() {
        let mapped = AdbError::from(std::io::Error::other("broken pipe"));
        assert!(matches!(mapped, AdbError::IoError(msg) if msg.contains("broken pipe")));
    }

    #[test]
    fn command_failure_names_the_command() {
        let error = AdbError::CommandFailed {
            command: "devices -l".to_string(),
            stderr: "daemon not running".to_string(),
        };
        assert_eq!(error.to_string(), "adb devices -l failed: daemon not running");
    }
}

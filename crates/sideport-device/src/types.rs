use std::fmt;

/// Which attached device a connect attempt should open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSelector {
    /// The only attached device; ambiguous when several are present.
    #[default]
    Any,
    Serial(String),
}

impl DeviceSelector {
    #[must_use]
    pub fn from_serial(serial: Option<String>) -> Self {
        match serial {
            Some(serial) if !serial.trim().is_empty() => Self::Serial(serial.trim().to_string()),
            _ => Self::Any,
        }
    }

    #[must_use]
    pub fn matches(&self, serial: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Serial(expected) => expected == serial,
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any device"),
            Self::Serial(serial) => write!(f, "{serial}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Online,
    Unauthorized,
    Offline,
    Other,
}

impl DeviceState {
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state {
            "device" => Self::Online,
            "unauthorized" => Self::Unauthorized,
            "offline" => Self::Offline,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Offline => write!(f, "offline"),
            Self::Other => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub state: DeviceState,
    pub model: Option<String>,
}

impl DeviceInfo {
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{model} ({})", self.serial),
            None => self.serial.clone(),
        }
    }
}

/// Byte counters emitted while a push is in flight. `total` is zero when the
/// source length is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

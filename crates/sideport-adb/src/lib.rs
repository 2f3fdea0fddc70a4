//! [`sideport_device`] implementation backed by a local `adb` executable.

mod client;
mod detection;
mod error;
mod session;

pub use client::{AdbClient, parse_devices, shell_quote};
pub use detection::locate_adb;
pub use error::AdbError;
pub use session::{AdbConnector, AdbSession, select_device};

//! Device session boundary for Sideport.
//!
//! The orchestrator in `sideport-core` never talks to a transport directly.
//! It consumes the traits defined here:
//! - [`DeviceConnector`] opens an authenticated [`DeviceSession`].
//! - [`DeviceSession`] runs remote commands and pushes files.
//! - [`ByteSource`] is the pull-based byte stream a push reads from.

mod error;
mod traits;
mod types;

pub use error::{DeviceError, SourceError};
pub use traits::{ByteSource, DeviceConnector, DeviceSession};
pub use types::{DeviceInfo, DeviceSelector, DeviceState, TransferProgress};

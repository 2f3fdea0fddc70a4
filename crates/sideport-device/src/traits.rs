use async_trait::async_trait;

use crate::error::{DeviceError, SourceError};
use crate::types::{DeviceInfo, DeviceSelector, TransferProgress};

/// Pull-based byte stream read by [`DeviceSession::push_file`].
///
/// A push asks for the next chunk only after the previous one has been
/// written to the transport, so a source never buffers more than one chunk.
#[async_trait]
pub trait ByteSource: Send {
    /// Total length in bytes, or zero when unknown.
    fn total_len(&self) -> u64;

    /// Next chunk, or `None` once the stream is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

#[async_trait]
pub trait DeviceConnector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    /// Open an authenticated session.
    ///
    /// `on_auth_pending` fires at most once, after the link is up but before the
    /// device has accepted this host.
    async fn connect(
        &self,
        selector: &DeviceSelector,
        on_auth_pending: &(dyn Fn() + Send + Sync),
    ) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

#[async_trait]
pub trait DeviceSession: Send + Sync {
    fn device(&self) -> &DeviceInfo;

    /// Run `argv` on the device and return its captured text output.
    async fn run_command(&self, argv: &[&str]) -> Result<String, DeviceError>;

    async fn push_file(
        &self,
        remote_path: &str,
        source: &mut dyn ByteSource,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<(), DeviceError>;

    /// Release the session. Idempotent; close errors are swallowed.
    async fn disconnect(&self);
}

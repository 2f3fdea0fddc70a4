use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use sideport_device::{
    ByteSource, DeviceConnector, DeviceError, DeviceInfo, DeviceSelector, DeviceSession,
    DeviceState, TransferProgress,
};
use tokio::io::AsyncWriteExt;

use crate::client::AdbClient;

const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);
const AUTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Opens sessions to devices visible to a local adb server.
pub struct AdbConnector {
    client: AdbClient,
    auth_timeout: Duration,
}

impl AdbConnector {
    #[must_use]
    pub fn new(client: AdbClient) -> Self {
        Self {
            client,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    async fn list(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        self.client
            .devices()
            .await
            .map_err(|e| DeviceError::connection("list devices", e.to_string()))
    }

    async fn wait_for_authorization(&self, serial: &str) -> Result<DeviceInfo, DeviceError> {
        let deadline = tokio::time::Instant::now() + self.auth_timeout;
        loop {
            tokio::time::sleep(AUTH_POLL_INTERVAL).await;

            let device = self
                .list()
                .await?
                .into_iter()
                .find(|device| device.serial == serial)
                .ok_or_else(|| {
                    DeviceError::connection("authorize", format!("{serial} was disconnected"))
                })?;
            if device.state == DeviceState::Online {
                return Ok(device);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DeviceError::connection(
                    "authorize",
                    format!("USB debugging was not approved on {serial} in time"),
                ));
            }
        }
    }
}

/// Pick the device a selector refers to.
///
/// # Errors
/// Returns a connection error when nothing matches or `Any` is ambiguous.
pub fn select_device(
    devices: Vec<DeviceInfo>,
    selector: &DeviceSelector,
) -> Result<DeviceInfo, DeviceError> {
    let mut matching: Vec<DeviceInfo> = devices
        .into_iter()
        .filter(|device| selector.matches(&device.serial))
        .collect();

    match (selector, matching.len()) {
        (_, 0) => Err(DeviceError::connection(
            "select",
            match selector {
                DeviceSelector::Any => "no device attached".to_string(),
                DeviceSelector::Serial(serial) => format!("device {serial} is not attached"),
            },
        )),
        (DeviceSelector::Any, count) if count > 1 => Err(DeviceError::connection(
            "select",
            format!("{count} devices attached; choose one with --serial"),
        )),
        _ => Ok(matching.remove(0)),
    }
}

#[async_trait]
impl DeviceConnector for AdbConnector {
    fn name(&self) -> &'static str {
        "adb"
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        self.list().await
    }

    async fn connect(
        &self,
        selector: &DeviceSelector,
        on_auth_pending: &(dyn Fn() + Send + Sync),
    ) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let mut device = select_device(self.list().await?, selector)?;
        debug!("Selected {} ({})", device.serial, device.state);

        match device.state {
            DeviceState::Online => {}
            DeviceState::Unauthorized => {
                on_auth_pending();
                device = self.wait_for_authorization(&device.serial).await?;
            }
            DeviceState::Offline | DeviceState::Other => {
                return Err(DeviceError::connection(
                    "open",
                    format!("device {} is {}", device.serial, device.state),
                ));
            }
        }

        if device.model.is_none() {
            match self.client.getprop(&device.serial, "ro.product.model").await {
                Ok(model) => device.model = model,
                Err(e) => warn!("Could not read model of {}: {e}", device.serial),
            }
        }

        info!("Session open to {}", device.display_name());
        Ok(Box::new(AdbSession {
            client: self.client.clone(),
            device,
        }))
    }
}

/// Session bound to one device serial. adb keeps no per-session state, so
/// every operation is an independent adb invocation.
pub struct AdbSession {
    client: AdbClient,
    device: DeviceInfo,
}

#[async_trait]
impl DeviceSession for AdbSession {
    fn device(&self) -> &DeviceInfo {
        &self.device
    }

    async fn run_command(&self, argv: &[&str]) -> Result<String, DeviceError> {
        self.client
            .shell(&self.device.serial, argv)
            .await
            .map_err(|e| DeviceError::command(argv, e.to_string()))
    }

    async fn push_file(
        &self,
        remote_path: &str,
        source: &mut dyn ByteSource,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<(), DeviceError> {
        let mut child = self
            .client
            .spawn_writer(&self.device.serial, remote_path)
            .map_err(|e| DeviceError::transfer(remote_path, e.to_string()))?;
        let Some(mut stdin) = child.stdin.take() else {
            return Err(DeviceError::transfer(remote_path, "adb stdin was not captured"));
        };

        let total_bytes = source.total_len();
        let mut bytes_sent = 0_u64;
        loop {
            let chunk = match source.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(error) => {
                    drop(stdin);
                    if let Err(e) = child.kill().await {
                        debug!("adb writer for {remote_path} already gone: {e}");
                    }
                    return Err(DeviceError::from_source(remote_path, error));
                }
            };

            stdin
                .write_all(&chunk)
                .await
                .map_err(|e| DeviceError::transfer(remote_path, e.to_string()))?;
            bytes_sent += chunk.len() as u64;
            on_progress(TransferProgress {
                bytes_sent,
                total_bytes,
            });
        }

        stdin
            .shutdown()
            .await
            .map_err(|e| DeviceError::transfer(remote_path, e.to_string()))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DeviceError::transfer(remote_path, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::transfer(remote_path, stderr.trim()));
        }

        debug!("Pushed {bytes_sent} bytes to {remote_path}");
        Ok(())
    }

    async fn disconnect(&self) {
        debug!("Closed session to {}", self.device.serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(serial: &str, state: DeviceState) -> DeviceInfo {
        DeviceInfo {
            serial: serial.to_string(),
            state,
            model: None,
        }
    }

    #[test]
    fn any_selects_the_only_device() {
        let selected = select_device(
            vec![device("A", DeviceState::Online)],
            &DeviceSelector::Any,
        )
        .expect("single device should be selected");
        assert_eq!(selected.serial, "A");
    }

    #[test]
    fn any_is_ambiguous_with_several_devices() {
        let error = select_device(
            vec![
                device("A", DeviceState::Online),
                device("B", DeviceState::Online),
            ],
            &DeviceSelector::Any,
        )
        .expect_err("two devices are ambiguous");
        assert_eq!(error.kind(), "ConnectionError");
        assert!(error.to_string().contains("--serial"));
    }

    #[test]
    fn serial_picks_among_several() {
        let selected = select_device(
            vec![
                device("A", DeviceState::Online),
                device("B", DeviceState::Unauthorized),
            ],
            &DeviceSelector::Serial("B".to_string()),
        )
        .expect("serial should match");
        assert_eq!(selected.state, DeviceState::Unauthorized);
    }

    #[test]
    fn missing_device_is_a_connection_error() {
        let error = select_device(Vec::new(), &DeviceSelector::Any)
            .expect_err("no devices attached");
        assert_eq!(
            error.to_string(),
            "Connection failed (select): no device attached"
        );

        let error = select_device(
            vec![device("A", DeviceState::Online)],
            &DeviceSelector::Serial("Z".to_string()),
        )
        .expect_err("unknown serial");
        assert!(error.to_string().contains("device Z is not attached"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn push_streams_chunks_through_a_fake_adb() {
        use std::os::unix::fs::PermissionsExt;

        use sideport_device::SourceError;

        struct Chunks(Vec<Vec<u8>>);

        #[async_trait]
        impl ByteSource for Chunks {
            fn total_len(&self) -> u64 {
                self.0.iter().map(|c| c.len() as u64).sum()
            }

            async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
                Ok((!self.0.is_empty()).then(|| self.0.remove(0)))
            }
        }

        let temp = tempfile::tempdir().expect("tempdir should be created");
        let sink = temp.path().join("pushed.bin");
        let adb = temp.path().join("adb");
        std::fs::write(&adb, format!("#!/bin/sh\ncat > '{}'\n", sink.display()))
            .expect("fake adb should be written");
        std::fs::set_permissions(&adb, std::fs::Permissions::from_mode(0o755))
            .expect("fake adb should be executable");

        let session = AdbSession {
            client: AdbClient::new(adb),
            device: device("A", DeviceState::Online),
        };
        let mut source = Chunks(vec![b"abc".to_vec(), b"defg".to_vec()]);
        let mut seen = Vec::new();
        session
            .push_file("/data/local/tmp/x.apk", &mut source, &mut |p: TransferProgress| seen.push(p))
            .await
            .expect("push should succeed");

        assert_eq!(std::fs::read(&sink).expect("sink should exist"), b"abcdefg");
        assert_eq!(seen.last().map(|p| p.bytes_sent), Some(7));
        assert!(seen.iter().all(|p| p.total_bytes == 7));
    }
}

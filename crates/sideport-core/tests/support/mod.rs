//! Scripted in-memory device used by the orchestrator tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sideport_core::{EventSink, InstallEvent, InstallOptions, InstallState, Installer};
use sideport_device::{
    ByteSource, DeviceConnector, DeviceError, DeviceInfo, DeviceSelector, DeviceSession,
    DeviceState, TransferProgress,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Command(Vec<String>),
    Push { remote_path: String, bytes: Vec<u8> },
    Disconnect,
}

#[derive(Debug, Default)]
pub struct Script {
    pub install_output: String,
    /// Commands whose first argument matches fail with a command error.
    pub failing_program: Option<String>,
    /// Cancelled after the first chunk of the first push.
    pub cancel_during_push: Option<CancellationToken>,
    pub require_authorization: bool,
}

#[derive(Clone, Default)]
pub struct DeviceLog {
    ops: Arc<Mutex<Vec<Op>>>,
    progress: Arc<Mutex<Vec<TransferProgress>>>,
}

impl DeviceLog {
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().expect("ops lock should not be poisoned").clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Command(argv) => Some(argv.join(" ")),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> Vec<(String, Vec<u8>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Push { remote_path, bytes } => Some((remote_path, bytes)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: Op) {
        self.ops
            .lock()
            .expect("ops lock should not be poisoned")
            .push(op);
    }
}

pub struct FakeConnector {
    pub log: DeviceLog,
    script: Arc<Script>,
}

impl FakeConnector {
    pub fn new(script: Script) -> Self {
        Self {
            log: DeviceLog::default(),
            script: Arc::new(script),
        }
    }
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(vec![fake_device()])
    }

    async fn connect(
        &self,
        selector: &DeviceSelector,
        on_auth_pending: &(dyn Fn() + Send + Sync),
    ) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let device = fake_device();
        if !selector.matches(&device.serial) {
            return Err(DeviceError::connection("select", format!("{selector} not attached")));
        }
        if self.script.require_authorization {
            on_auth_pending();
        }
        Ok(Box::new(FakeSession {
            device,
            log: self.log.clone(),
            script: Arc::clone(&self.script),
        }))
    }
}

struct FakeSession {
    device: DeviceInfo,
    log: DeviceLog,
    script: Arc<Script>,
}

#[async_trait]
impl DeviceSession for FakeSession {
    fn device(&self) -> &DeviceInfo {
        &self.device
    }

    async fn run_command(&self, argv: &[&str]) -> Result<String, DeviceError> {
        self.log
            .record(Op::Command(argv.iter().map(ToString::to_string).collect()));

        if self
            .script
            .failing_program
            .as_deref()
            .is_some_and(|program| argv.first() == Some(&program))
        {
            return Err(DeviceError::command(argv, "stream closed"));
        }
        if argv.first() == Some(&"pm") {
            return Ok(self.script.install_output.clone());
        }
        Ok(String::new())
    }

    async fn push_file(
        &self,
        remote_path: &str,
        source: &mut dyn ByteSource,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<(), DeviceError> {
        let total_bytes = source.total_len();
        let mut bytes = Vec::new();
        loop {
            let chunk = source
                .next_chunk()
                .await
                .map_err(|error| DeviceError::from_source(remote_path, error))?;
            let Some(chunk) = chunk else { break };
            bytes.extend_from_slice(&chunk);

            let progress = TransferProgress {
                bytes_sent: bytes.len() as u64,
                total_bytes,
            };
            self.log
                .progress
                .lock()
                .expect("progress lock should not be poisoned")
                .push(progress);
            on_progress(progress);

            if let Some(token) = &self.script.cancel_during_push {
                token.cancel();
            }
        }

        self.log.record(Op::Push {
            remote_path: remote_path.to_string(),
            bytes,
        });
        Ok(())
    }

    async fn disconnect(&self) {
        self.log.record(Op::Disconnect);
    }
}

pub fn fake_device() -> DeviceInfo {
    DeviceInfo {
        serial: "1WMHH000000000".to_string(),
        state: DeviceState::Online,
        model: Some("Quest 3".to_string()),
    }
}

pub struct Harness {
    pub installer: Installer,
    pub log: DeviceLog,
    pub events: mpsc::UnboundedReceiver<InstallEvent>,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        Self::with_options(script, InstallOptions::default())
    }

    pub fn with_options(script: Script, options: InstallOptions) -> Self {
        let connector = FakeConnector::new(script);
        let log = connector.log.clone();
        let (sink, events) = EventSink::channel();
        let installer = Installer::new(Arc::new(connector), reqwest::Client::new(), options, sink);
        Self {
            installer,
            log,
            events,
        }
    }

    pub async fn connected(script: Script) -> Self {
        let mut harness = Self::new(script);
        harness
            .installer
            .connect(&DeviceSelector::Any)
            .await
            .expect("fake device should connect");
        harness
    }

    pub fn drain_events(&mut self) -> Vec<InstallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn states(&mut self) -> Vec<InstallState> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                InstallEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }
}

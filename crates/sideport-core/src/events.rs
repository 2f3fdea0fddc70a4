use std::fmt;

use tokio::sync::mpsc;

/// Stage of a single install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    PreparingSource,
    Transferring,
    Installing,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::PreparingSource => "preparing source",
            Self::Transferring => "transferring",
            Self::Installing => "installing",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    State(InstallState),
    Log(String),
    Progress { label: String, percent: u8 },
    /// Verbatim output of the remote install command.
    Output(String),
}

/// Sending half handed to the orchestrator. Events are dropped silently
/// once the receiver is gone.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<InstallEvent>>,
}

impl EventSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    #[must_use]
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: InstallEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn state(&self, state: InstallState) {
        self.emit(InstallEvent::State(state));
    }

    pub fn log(&self, line: impl Into<String>) {
        self.emit(InstallEvent::Log(line.into()));
    }
}

use log::info;
use sideport_device::TransferProgress;

use crate::events::{EventSink, InstallEvent};

const STEP_PERCENT: u8 = 5;

/// Turns raw byte counters of one transfer into at most ~20 progress lines.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    last_percent: u8,
    finished: bool,
    events: EventSink,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(label: impl Into<String>, events: EventSink) -> Self {
        Self {
            label: label.into(),
            last_percent: 0,
            finished: false,
            events,
        }
    }

    /// Percentage to announce for this update, if it crosses a 5-point step
    /// or reaches completion for the first time. Unknown totals never announce.
    pub fn observe(&mut self, sent: u64, total: u64) -> Option<u8> {
        if total == 0 || self.finished {
            return None;
        }

        let percent = (u128::from(sent) * 100 / u128::from(total)).min(100);
        let percent = u8::try_from(percent).unwrap_or(100);

        if percent >= 100 {
            self.finished = true;
        } else if percent < self.last_percent.saturating_add(STEP_PERCENT) {
            return None;
        }
        self.last_percent = percent;
        Some(percent)
    }

    pub fn on_progress(&mut self, progress: TransferProgress) {
        if let Some(percent) = self.observe(progress.bytes_sent, progress.total_bytes) {
            info!("{}: {percent}%", self.label);
            self.events.emit(InstallEvent::Progress {
                label: self.label.clone(),
                percent,
            });
        }
    }
}

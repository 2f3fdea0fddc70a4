use sideport_core::{InstallEvent, InstallOutcome, InstallState, ManifestInfo};
use sideport_device::DeviceInfo;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Text line for one event, or `None` for events that add nothing on a
/// terminal.
pub fn event_line(event: &InstallEvent) -> Option<String> {
    match event {
        InstallEvent::State(InstallState::Idle | InstallState::Done) => None,
        InstallEvent::State(state) => Some(format!("==> {state}")),
        InstallEvent::Log(line) => Some(line.clone()),
        InstallEvent::Progress { label, percent } => Some(format!("    {label}: {percent}%")),
        InstallEvent::Output(output) => Some(format!("--- install output ---\n{}", output.trim_end())),
    }
}

/// Print events until every sender is gone.
pub fn spawn_printer(mut events: mpsc::UnboundedReceiver<InstallEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = event_line(&event) {
                println!("{line}");
            }
        }
    })
}

pub fn outcome_summary(outcome: &InstallOutcome) -> String {
    let mut summary = if outcome.success_detected {
        "Install finished successfully".to_string()
    } else {
        format!(
            "Install may have failed; the device answered:\n{}",
            outcome.output.trim_end()
        )
    };
    if !outcome.auxiliary_remote_paths.is_empty() {
        summary.push_str(&format!(
            "\nData files: {}",
            outcome.auxiliary_remote_paths.join(", ")
        ));
    }
    summary
}

pub fn device_table(devices: &[DeviceInfo]) -> String {
    if devices.is_empty() {
        return "No devices attached".to_string();
    }
    devices
        .iter()
        .map(|device| {
            format!(
                "{:<20} {:<13} {}",
                device.serial,
                device.state.to_string(),
                device.model.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn manifest_summary(manifest: &ManifestInfo) -> String {
    let mut lines = vec![
        format!("Package:      {}", manifest.package_name),
        format!("Version code: {}", manifest.version_code),
        format!("Package file: {}", manifest.package_file_path),
        "Data files:".to_string(),
    ];
    lines.extend(
        manifest
            .auxiliary_file_paths
            .iter()
            .map(|path| format!("  {path}")),
    );
    lines.join("\n")
}

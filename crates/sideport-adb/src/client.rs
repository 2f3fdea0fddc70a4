use std::path::PathBuf;
use std::process::Stdio;

use sideport_device::{DeviceInfo, DeviceState};
use sideport_platform::background_command;
use tokio::process::{Child, Command};

use crate::error::AdbError;

/// Thin wrapper around one `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbClient {
    pub adb_path: PathBuf,
}

impl AdbClient {
    #[must_use]
    pub fn new(adb_path: PathBuf) -> Self {
        Self { adb_path }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = background_command(&self.adb_path);
        cmd.args(args);
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<String, AdbError> {
        let output = self.command(args).output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(AdbError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// List attached devices with their state and model.
    ///
    /// # Errors
    /// Returns an error if `adb devices -l` cannot be run.
    pub async fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = self.execute(&["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    /// Run `argv` through the device shell and return everything it printed.
    ///
    /// A non-zero exit still counts as output when the command printed to
    /// stdout; package manager failures are reported that way.
    ///
    /// # Errors
    /// Returns an error if adb cannot be run or the command produced nothing
    /// but an error.
    pub async fn shell(&self, serial: &str, argv: &[&str]) -> Result<String, AdbError> {
        let command_line = shell_command_line(argv);
        log::debug!("adb -s {serial} shell {command_line}");
        let output = self
            .command(&["-s", serial, "shell", &command_line])
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(AdbError::CommandFailed {
                command: format!("shell {command_line}"),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(if stderr.trim().is_empty() {
            stdout
        } else {
            format!("{stdout}{stderr}")
        })
    }

    /// Read one system property; empty values become `None`.
    ///
    /// # Errors
    /// Returns an error if the shell command fails.
    pub async fn getprop(&self, serial: &str, key: &str) -> Result<Option<String>, AdbError> {
        let value = self.shell(serial, &["getprop", key]).await?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    /// Start a process that writes its stdin to `remote_path` on the device.
    ///
    /// # Errors
    /// Returns an error if adb cannot be spawned.
    pub fn spawn_writer(&self, serial: &str, remote_path: &str) -> Result<Child, AdbError> {
        let remote = format!("cat > {}", shell_quote(remote_path));
        let mut cmd = self.command(&["-s", serial, "exec-in", &remote]);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        Ok(cmd.spawn()?)
    }
}

/// Parse `adb devices -l`.
#[must_use]
pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*')
        })
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = DeviceState::parse(fields.next()?);
            let model = fields
                .find_map(|field| field.strip_prefix("model:"))
                .map(|model| model.replace('_', " "));
            Some(DeviceInfo {
                serial: serial.to_string(),
                state,
                model,
            })
        })
        .collect()
}

/// Quote one argument for a POSIX shell.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "._-/:=@%+,".contains(ch));
    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn shell_command_line(argv: &[&str]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
1WMHH000000000         device usb:1-1 product:eureka model:Quest_3 device:eureka transport_id:1
2G0YC1ZF8B07WD         unauthorized usb:1-2 transport_id:2
emulator-5554          offline

";

    #[test]
    fn parses_device_listing() {
        let devices = parse_devices(DEVICES);

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "1WMHH000000000");
        assert_eq!(devices[0].state, DeviceState::Online);
        assert_eq!(devices[0].model.as_deref(), Some("Quest 3"));
        assert_eq!(devices[1].state, DeviceState::Unauthorized);
        assert_eq!(devices[1].model, None);
        assert_eq!(devices[2].state, DeviceState::Offline);
    }

    #[test]
    fn empty_listing_has_no_devices() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn shell_quote_leaves_plain_words() {
        assert_eq!(shell_quote("pm"), "pm");
        assert_eq!(shell_quote("/data/local/tmp/1_game.apk"), "/data/local/tmp/1_game.apk");
    }

    #[test]
    fn shell_quote_wraps_metacharacters() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn command_line_quotes_each_argument() {
        assert_eq!(
            shell_command_line(&["mkdir", "-p", "/sdcard/Android/obb/com.example app"]),
            "mkdir -p '/sdcard/Android/obb/com.example app'"
        );
    }

    #[test]
    fn client_keeps_adb_path() {
        let client = AdbClient::new(PathBuf::from("/opt/platform-tools/adb"));
        assert_eq!(
            client.command(&["devices"]).as_std().get_program(),
            "/opt/platform-tools/adb"
        );
    }
}

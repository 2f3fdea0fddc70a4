use std::path::{Path, PathBuf};

use which::which;

use crate::error::AdbError;

#[cfg(windows)]
const ADB_EXECUTABLE: &str = "adb.exe";
#[cfg(not(windows))]
const ADB_EXECUTABLE: &str = "adb";

/// Find the `adb` executable.
///
/// An explicit override wins when it exists; otherwise `PATH` is searched,
/// then the usual Android SDK locations.
///
/// # Errors
/// Returns [`AdbError::NotFound`] when no candidate exists.
pub fn locate_adb(override_path: Option<&Path>) -> Result<PathBuf, AdbError> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        log::warn!("Configured adb path {} does not exist", path.display());
    }

    if let Ok(path) = which("adb") {
        return Ok(path);
    }

    select_existing(sdk_candidates()).ok_or(AdbError::NotFound)
}

fn select_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|candidate| candidate.is_file())
}

fn sdk_candidates() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Ok(root) = std::env::var(var) {
            roots.push(PathBuf::from(root));
        }
    }

    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Android").join("Sdk"));
        roots.push(home.join("Library").join("Android").join("sdk"));
    }

    if let Some(local) = dirs::data_local_dir() {
        roots.push(local.join("Android").join("Sdk"));
    }

    roots
        .into_iter()
        .map(|root| root.join("platform-tools").join(ADB_EXECUTABLE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_override_wins() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let adb = temp.path().join(ADB_EXECUTABLE);
        std::fs::write(&adb, b"").expect("fake adb should be written");

        let found = locate_adb(Some(&adb)).expect("override should be used");

        assert_eq!(found, adb);
    }

    #[test]
    fn select_existing_skips_missing_candidates() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let present = temp.path().join("b").join(ADB_EXECUTABLE);
        std::fs::create_dir_all(present.parent().expect("candidate has a parent"))
            .expect("candidate dir should be created");
        std::fs::write(&present, b"").expect("fake adb should be written");

        let selected = select_existing(vec![temp.path().join("a").join(ADB_EXECUTABLE), present.clone()]);

        assert_eq!(selected, Some(present));
    }

    #[test]
    fn sdk_candidates_point_into_platform_tools() {
        assert!(
            sdk_candidates()
                .iter()
                .all(|path| path.ends_with(Path::new("platform-tools").join(ADB_EXECUTABLE)))
        );
    }
}

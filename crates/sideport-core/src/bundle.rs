use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::manifest::{MANIFEST_FILE_NAME, normalize_manifest_path};

/// A local file picked by the user.
///
/// `relative_path` is set when the file was picked as part of a folder; it
/// starts with the name of that folder (`MyGame/obb/main.obb`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub relative_path: Option<String>,
}

impl SelectedFile {
    #[must_use]
    pub fn standalone(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            relative_path: None,
        }
    }

    fn file_set_key(&self) -> String {
        match &self.relative_path {
            Some(relative) => {
                let relative = to_forward_slashes(relative);
                match relative.split_once('/') {
                    Some((_bundle_folder, rest)) if !rest.is_empty() => rest.to_string(),
                    _ => relative,
                }
            }
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bundle does not contain `{manifest_path}`")]
pub struct FileResolutionError {
    pub manifest_path: String,
}

/// Selected files keyed by their path inside the bundle folder.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    entries: Vec<(String, SelectedFile)>,
    index: HashMap<String, usize>,
}

impl FileSet {
    #[must_use]
    pub fn build(files: impl IntoIterator<Item = SelectedFile>) -> Self {
        let mut set = Self::default();
        for file in files {
            let key = file.file_set_key();
            if key.is_empty() || set.index.contains_key(&key) {
                debug!("Skipping duplicate or unnamed bundle entry {key:?}");
                continue;
            }
            set.index.insert(key.clone(), set.entries.len());
            set.entries.push((key, file));
        }
        set
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Look up a manifest-relative path: exact key first, then the first key
    /// (in selection order) that ends with the path on a segment boundary,
    /// then the first key that ends with it at all.
    #[must_use]
    pub fn resolve(&self, manifest_path: &str) -> Option<&SelectedFile> {
        let wanted = normalize_manifest_path(&to_forward_slashes(manifest_path));
        if wanted.is_empty() {
            return None;
        }

        if let Some(&position) = self.index.get(&wanted) {
            return Some(&self.entries[position].1);
        }

        let segment_suffix = format!("/{wanted}");
        self.entries
            .iter()
            .find(|(key, _)| key.ends_with(&segment_suffix))
            .or_else(|| self.entries.iter().find(|(key, _)| key.ends_with(&wanted)))
            .map(|(key, file)| {
                debug!("Resolved {wanted} to {key} by suffix match");
                file
            })
    }

    /// Like [`FileSet::resolve`], but a miss is an error naming the path.
    ///
    /// # Errors
    /// Returns [`FileResolutionError`] when no selected file matches.
    pub fn resolve_required(&self, manifest_path: &str) -> Result<&SelectedFile, FileResolutionError> {
        self.resolve(manifest_path)
            .ok_or_else(|| FileResolutionError {
                manifest_path: manifest_path.to_string(),
            })
    }

    /// Locate the bundle's `release.manifest`.
    ///
    /// # Errors
    /// Returns [`FileResolutionError`] when the selection has no manifest.
    pub fn manifest_file(&self) -> Result<&SelectedFile, FileResolutionError> {
        self.resolve_required(MANIFEST_FILE_NAME)
    }
}

/// Select every regular file below `root` the way a folder picker does:
/// each relative path begins with the folder's own name.
///
/// # Errors
/// Returns an error when the directory cannot be walked.
pub fn select_folder(root: &Path) -> Result<Vec<SelectedFile>, walkdir::Error> {
    let folder_name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(inner) = entry.path().strip_prefix(root) else {
            continue;
        };
        let inner = to_forward_slashes(&inner.to_string_lossy());
        files.push(SelectedFile {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            relative_path: Some(format!("{folder_name}/{inner}")),
        });
    }
    Ok(files)
}

/// Last segment of a manifest path.
#[must_use]
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picked(relative: &str) -> SelectedFile {
        SelectedFile {
            path: PathBuf::from("/picked").join(relative),
            name: base_name(relative).to_string(),
            relative_path: Some(relative.to_string()),
        }
    }

    #[test]
    fn build_strips_the_bundle_folder_segment() {
        let set = FileSet::build([
            picked("MyGame/release.manifest"),
            picked("MyGame/game.apk"),
            picked("MyGame/obb/main.1.obb"),
        ]);

        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["release.manifest", "game.apk", "obb/main.1.obb"]);
    }

    #[test]
    fn build_uses_bare_name_without_relative_path() {
        let set = FileSet::build([SelectedFile::standalone(PathBuf::from("/tmp/x/game.apk"))]);

        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["game.apk"]);
    }

    #[test]
    fn manifest_resolves_after_folder_prefix_stripping() {
        let set = FileSet::build([picked("MyGame/game.apk"), picked("MyGame/release.manifest")]);

        let manifest = set.manifest_file().expect("manifest should be found");
        assert_eq!(manifest.path, PathBuf::from("/picked/MyGame/release.manifest"));
    }

    #[test]
    fn nested_bundle_folder_resolves_by_suffix() {
        let set = FileSet::build([
            picked("Download/MyGame/release.manifest"),
            picked("Download/MyGame/main.1.obb"),
        ]);

        let manifest = set.manifest_file().expect("manifest should be found by suffix");
        assert_eq!(manifest.name, "release.manifest");
        let obb = set.resolve("./main.1.obb").expect("obb should be found by suffix");
        assert_eq!(obb.path, PathBuf::from("/picked/Download/MyGame/main.1.obb"));
    }

    #[test]
    fn exact_match_wins_over_suffix_match() {
        let set = FileSet::build([
            picked("Bundle/extra/game.apk"),
            picked("Bundle/game.apk"),
        ]);

        let file = set.resolve("game.apk").expect("game.apk should resolve");
        assert_eq!(file.path, PathBuf::from("/picked/Bundle/game.apk"));
    }

    #[test]
    fn segment_boundary_suffix_beats_earlier_partial_name() {
        let set = FileSet::build([
            picked("Bundle/mygame.apk"),
            picked("Bundle/extra/game.apk"),
        ]);

        let file = set.resolve("game.apk").expect("game.apk should resolve");
        assert_eq!(file.path, PathBuf::from("/picked/Bundle/extra/game.apk"));
    }

    #[test]
    fn producer_prefixed_name_resolves_as_last_resort() {
        let set = FileSet::build([picked("Bundle/v2_main.1.obb")]);

        let file = set.resolve("main.1.obb").expect("prefixed name should resolve");
        assert_eq!(file.path, PathBuf::from("/picked/Bundle/v2_main.1.obb"));
        assert!(set.resolve("main.2.obb").is_none());
    }

    #[test]
    fn resolution_is_repeatable() {
        let set = FileSet::build([picked("Bundle/data/main.obb")]);

        let first = set.resolve("main.obb").map(|file| file.path.clone());
        let second = set.resolve("main.obb").map(|file| file.path.clone());
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn missing_path_is_an_error_naming_it() {
        let set = FileSet::build([picked("Bundle/game.apk")]);

        let error = set
            .resolve_required("main.obb")
            .expect_err("missing file should fail");
        assert_eq!(error.manifest_path, "main.obb");
        assert_eq!(error.to_string(), "bundle does not contain `main.obb`");
    }

    #[test]
    fn select_folder_prefixes_relative_paths_with_folder_name() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let root = temp.path().join("MyGame");
        std::fs::create_dir_all(root.join("obb")).expect("bundle dirs should be created");
        std::fs::write(root.join("release.manifest"), "x").expect("manifest should be written");
        std::fs::write(root.join("obb/main.obb"), "x").expect("obb should be written");

        let files = select_folder(&root).expect("folder should be walked");
        let relative: Vec<_> = files
            .iter()
            .filter_map(|file| file.relative_path.as_deref())
            .collect();

        assert_eq!(relative, vec!["MyGame/obb/main.obb", "MyGame/release.manifest"]);
    }

    #[test]
    fn base_name_takes_last_segment() {
        assert_eq!(base_name("data/main.1.obb"), "main.1.obb");
        assert_eq!(base_name("main.1.obb"), "main.1.obb");
    }
}

//! Parser for `release.manifest` documents.
//!
//! A manifest is `;`-delimited text with a metadata header/row pair followed by
//! a `#filelist` section:
//!
//! ```text
//! Package Name;Version Code;Version Name
//! com.example.app;42;1.4.0
//! #filelist
//! f;game.apk;123456
//! f;main.42.com.example.app.obb;987654
//! ```

use thiserror::Error;

pub const PACKAGE_EXTENSION: &str = ".apk";
pub const DATA_EXTENSION: &str = ".obb";
pub const MANIFEST_FILE_NAME: &str = "release.manifest";

const FIELD_DELIMITER: char = ';';
const PACKAGE_NAME_LABEL: &str = "Package Name";
const VERSION_CODE_LABEL: &str = "Version Code";
const FILELIST_MARKER: &str = "#filelist";
const FILE_TAG: &str = "f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    pub package_name: String,
    pub version_code: String,
    pub package_file_path: String,
    pub auxiliary_file_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestFormatError {
    #[error("manifest has no header line with `Package Name` and `Version Code` columns")]
    MissingHeader,
    #[error("manifest header is not followed by a metadata row")]
    MissingMetadataRow,
    #[error("manifest metadata row has an empty `{column}` value")]
    EmptyField { column: &'static str },
    #[error("manifest has no `#filelist` section")]
    MissingFileList,
    #[error("manifest file list declares no `.apk` package file")]
    NoPackageFile,
    #[error("manifest file list declares no `.obb` data files")]
    NoAuxiliaryFiles,
}

/// Parse a manifest document.
///
/// # Errors
/// Returns [`ManifestFormatError`] naming the first required element that is
/// missing; a partially populated [`ManifestInfo`] is never returned.
pub fn parse_manifest(text: &str) -> Result<ManifestInfo, ManifestFormatError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let header_index = lines
        .iter()
        .position(|line| is_metadata_header(line))
        .ok_or(ManifestFormatError::MissingHeader)?;
    let header = split_fields(lines[header_index]);
    let row = lines
        .get(header_index + 1)
        .map(|line| split_fields(line))
        .ok_or(ManifestFormatError::MissingMetadataRow)?;

    let package_name = column_value(&header, &row, PACKAGE_NAME_LABEL)?;
    let version_code = column_value(&header, &row, VERSION_CODE_LABEL)?;

    let filelist_index = lines
        .iter()
        .position(|line| line.eq_ignore_ascii_case(FILELIST_MARKER))
        .ok_or(ManifestFormatError::MissingFileList)?;

    let mut package_paths = Vec::new();
    let mut auxiliary_file_paths = Vec::new();
    for line in &lines[filelist_index + 1..] {
        let Some(path) = file_entry_path(line) else {
            continue;
        };
        if has_suffix_ignore_case(&path, PACKAGE_EXTENSION) {
            package_paths.push(path);
        } else if has_suffix_ignore_case(&path, DATA_EXTENSION) {
            auxiliary_file_paths.push(path);
        }
    }

    let package_file_path = package_paths
        .into_iter()
        .next()
        .ok_or(ManifestFormatError::NoPackageFile)?;
    if auxiliary_file_paths.is_empty() {
        return Err(ManifestFormatError::NoAuxiliaryFiles);
    }

    Ok(ManifestInfo {
        package_name,
        version_code,
        package_file_path,
        auxiliary_file_paths,
    })
}

/// Strip the leading `./` and `/` a packager may put in front of a path.
#[must_use]
pub fn normalize_manifest_path(raw: &str) -> String {
    let mut path = raw.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_start_matches('/').trim().to_string()
}

#[must_use]
pub fn has_suffix_ignore_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value
            .get(value.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(FIELD_DELIMITER).map(str::trim).collect()
}

fn is_metadata_header(line: &str) -> bool {
    if !line.contains(FIELD_DELIMITER) {
        return false;
    }
    let fields = split_fields(line);
    label_index(&fields, PACKAGE_NAME_LABEL).is_some()
        && label_index(&fields, VERSION_CODE_LABEL).is_some()
}

/// Column of `label`: an exact (case-insensitive) header field, otherwise
/// the first field that contains it, as in `Package Name (id)`.
fn label_index(fields: &[&str], label: &str) -> Option<usize> {
    fields
        .iter()
        .position(|field| field.eq_ignore_ascii_case(label))
        .or_else(|| {
            let label = label.to_ascii_lowercase();
            fields
                .iter()
                .position(|field| field.to_ascii_lowercase().contains(&label))
        })
}

fn column_value(
    header: &[&str],
    row: &[&str],
    column: &'static str,
) -> Result<String, ManifestFormatError> {
    label_index(header, column)
        .and_then(|index| row.get(index))
        .filter(|value| !value.is_empty())
        .map(|value| (*value).to_string())
        .ok_or(ManifestFormatError::EmptyField { column })
}

fn file_entry_path(line: &str) -> Option<String> {
    if !line.contains(FIELD_DELIMITER) {
        return None;
    }
    let fields = split_fields(line);
    if fields.len() < 3 || fields[0] != FILE_TAG {
        return None;
    }
    let path = normalize_manifest_path(fields[1]);
    (!path.is_empty()).then_some(path)
}

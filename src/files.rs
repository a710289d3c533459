// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Log file discovery
//!
//! Devices write their logs into per-device folders named `watchNNN`
//! (three digits, zero padded), possibly nested under per-week folders:
//!
//! ```text
//! dir/week1/watch001/sensor_data_20190613_165634.csv
//! dir/week1/watch001/responses_20190613_170415.csv
//! dir/week2/watch001/sensor_data_20190620_081201.csv
//! ```
//!
//! [`discover`] finds every file of one kind for one device, i.e. every path
//! matching `**/watchNNN/<prefix>*` below the root, and returns them sorted.
//! That puts them in time order since names embed the start time.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{Result, SensorAlignError};
use crate::source::FileId;

/// Kind of log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    SensorData,
    Responses,
}

impl FileKind {
    /// File name prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            FileKind::SensorData => "sensor_data_",
            FileKind::Responses => "responses_",
        }
    }
}

/// Folder name for a device number (`watch007`)
pub fn device_dir_name(device_number: u32) -> String {
    format!("watch{:03}", device_number)
}

/// Glob, relative to the search root, matching files of `kind` for a device
pub fn device_pattern(device_number: u32, kind: FileKind) -> String {
    format!("**/{}/{}*", device_dir_name(device_number), kind.prefix())
}

/// All files of `kind` for `device_number` anywhere below `dir`, sorted
///
/// Symbolic links are not followed, so a link cycle cannot report the same
/// log twice.
pub fn discover(dir: impl AsRef<Path>, device_number: u32, kind: FileKind) -> Result<Vec<FileId>> {
    let dir = dir.as_ref();
    let glob = device_pattern(device_number, kind);
    let pattern = Pattern::new(&glob)
        .map_err(|e| SensorAlignError::InvalidConfig(format!("pattern '{}': {}", glob, e)))?;
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };

    let mut found: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry =
            entry.map_err(|e| SensorAlignError::source_error(dir.display().to_string(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if pattern.matches_path_with(relative, options) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    log::debug!(
        "found {} files matching {} under {}",
        found.len(),
        glob,
        dir.display()
    );

    found
        .into_iter()
        .map(|path| {
            path.into_os_string().into_string().map_err(|raw| {
                SensorAlignError::source_error(raw.to_string_lossy(), "path is not valid UTF-8")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_device_dir_name() {
        assert_eq!(device_dir_name(1), "watch001");
        assert_eq!(device_dir_name(42), "watch042");
        assert_eq!(device_dir_name(1234), "watch1234");
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("week2/watch001/sensor_data_20190620.csv"));
        touch(&root.join("week1/watch001/sensor_data_20190613_2.csv"));
        touch(&root.join("week1/watch001/sensor_data_20190613_1.csv"));
        touch(&root.join("week1/watch001/responses_20190613.csv"));
        touch(&root.join("week1/watch002/sensor_data_20190613.csv"));
        touch(&root.join("week1/other/watch001_sensor_data.csv"));

        let data = discover(root, 1, FileKind::SensorData).unwrap();
        let names: Vec<_> = data
            .iter()
            .map(|p| p.strip_prefix(root.to_str().unwrap()).unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "/week1/watch001/sensor_data_20190613_1.csv",
                "/week1/watch001/sensor_data_20190613_2.csv",
                "/week2/watch001/sensor_data_20190620.csv",
            ]
        );

        let responses = discover(root, 1, FileKind::Responses).unwrap();
        assert_eq!(responses.len(), 1);
        assert!(discover(root, 3, FileKind::SensorData).unwrap().is_empty());
    }

    #[test]
    fn test_device_pattern() {
        assert_eq!(
            device_pattern(7, FileKind::Responses),
            "**/watch007/responses_*"
        );
    }

    #[test]
    fn test_device_folder_directly_under_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("watch001/sensor_data_1.csv"));
        touch(&dir.path().join("watch001/nested/sensor_data_2.csv"));
        assert_eq!(discover(dir.path(), 1, FileKind::SensorData).unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_reports_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let week = dir.path().join("week1");
        touch(&week.join("watch001/sensor_data_1.csv"));
        std::os::unix::fs::symlink(&week, week.join("loop")).unwrap();

        let data = discover(dir.path(), 1, FileKind::SensorData).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data[0].ends_with("week1/watch001/sensor_data_1.csv"));
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover(missing, 1, FileKind::SensorData).is_err());
    }
}

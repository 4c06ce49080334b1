//! JSON scan file collaborator.
//!
//! Stands in for the modem and network manager when running on a machine
//! without them. The file is re-read on every query, so editing it and
//! sending the daemon a scan notification simulates moving around.
//!
//! # Format
//!
//! ```json
//! {
//!   "home_network": { "mcc": 250, "mnc": 1, "carrier": "Example" },
//!   "cells": [
//!     { "mcc": 250, "mnc": 1, "lac": 7700, "cell_id": 12345, "radio": "lte", "signal_strength": 30 }
//!   ],
//!   "access_points": [
//!     { "bssid": "00:11:22:33:44:55", "signal_dbm": -60 }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AccessPointSource, CellSource};
use crate::cell::{AccessPoint, CellPositioningData, HomeNetwork};

/// Everything a single scan observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    #[serde(default)]
    pub home_network: Option<HomeNetwork>,
    #[serde(default)]
    pub cells: Vec<CellPositioningData>,
    #[serde(default)]
    pub access_points: Vec<AccessPoint>,
}

/// Scan source backed by a JSON file.
#[derive(Debug, Clone)]
pub struct ScanFile {
    path: PathBuf,
}

impl ScanFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file.
    ///
    /// A missing or unreadable file is an empty scan; the failure is logged.
    pub fn read(&self) -> ScanSnapshot {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read scan file");
                return ScanSnapshot::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to parse scan file");
                ScanSnapshot::default()
            }
        }
    }
}

impl CellSource for ScanFile {
    fn visible_cells(&self) -> Vec<CellPositioningData> {
        self.read().cells
    }

    fn home_network(&self) -> Option<HomeNetwork> {
        self.read().home_network
    }
}

impl AccessPointSource for ScanFile {
    fn visible_access_points(&self) -> Vec<AccessPoint> {
        self.read().access_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::RadioType;
    use tempfile::TempDir;

    #[test]
    fn test_read_scan_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.json");
        std::fs::write(
            &path,
            r#"{
                "home_network": {"mcc": 250, "mnc": 1, "carrier": "Example"},
                "cells": [
                    {"mcc": 250, "mnc": 1, "lac": 7700, "cell_id": 12345, "radio": "lte", "signal_strength": 30},
                    {"mcc": 250, "mnc": 1, "lac": 7700, "cell_id": 12346, "signal_strength": 10}
                ],
                "access_points": [{"bssid": "00:11:22:33:44:55", "signal_dbm": -60}]
            }"#,
        )
        .unwrap();

        let source = ScanFile::new(&path);
        let cells = source.visible_cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].unique_cell_id.radio, Some(RadioType::Lte));
        assert_eq!(cells[1].unique_cell_id.radio, None);
        assert_eq!(
            source.home_network().and_then(|h| h.carrier),
            Some("Example".to_string())
        );
        assert_eq!(source.visible_access_points().len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty_scan() {
        let temp_dir = TempDir::new().unwrap();
        let source = ScanFile::new(temp_dir.path().join("missing.json"));
        assert_eq!(source.read(), ScanSnapshot::default());
    }

    #[test]
    fn test_invalid_json_is_empty_scan() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(ScanFile::new(&path).visible_cells().is_empty());
    }

    #[test]
    fn test_partial_file_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.json");
        std::fs::write(&path, r#"{"cells": []}"#).unwrap();

        let snapshot = ScanFile::new(&path).read();
        assert!(snapshot.home_network.is_none());
        assert!(snapshot.access_points.is_empty());
    }
}

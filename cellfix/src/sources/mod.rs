//! Collaborator interfaces for radio observations.
//!
//! The telephony stack and the network manager live outside this crate.
//! The provider only sees them through two narrow traits:
//!
//! - [`CellSource`] - visible cells and the SIM's home network
//! - [`AccessPointSource`] - visible WLAN access points
//!
//! Change notifications from those subsystems are delivered separately as
//! provider events; these traits are only queried.
//!
//! Two implementations ship with the crate: [`StaticScan`], an in-memory
//! scan that can be replaced at runtime, and [`ScanFile`], which re-reads a
//! JSON file on every query so the daemon can run without a modem.

mod scan_file;

pub use scan_file::{ScanFile, ScanSnapshot};

use std::sync::RwLock;

use crate::cell::{AccessPoint, CellPositioningData, HomeNetwork};

/// Supplies cell tower observations.
pub trait CellSource: Send + Sync {
    /// Cells visible right now, serving cell first.
    fn visible_cells(&self) -> Vec<CellPositioningData>;

    /// Home network of the SIM, if one is present.
    fn home_network(&self) -> Option<HomeNetwork> {
        None
    }
}

/// Supplies WLAN access point observations.
pub trait AccessPointSource: Send + Sync {
    /// Access points visible right now.
    fn visible_access_points(&self) -> Vec<AccessPoint>;
}

/// Scan data held in memory.
///
/// Implements both source traits. Tests and embedders replace the contents
/// with [`StaticScan::set`] and then notify the provider.
#[derive(Debug, Default)]
pub struct StaticScan {
    snapshot: RwLock<ScanSnapshot>,
}

impl StaticScan {
    pub fn new(snapshot: ScanSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Create a scan containing only cells.
    pub fn with_cells(cells: Vec<CellPositioningData>) -> Self {
        Self::new(ScanSnapshot {
            cells,
            ..Default::default()
        })
    }

    /// Replace the whole scan.
    pub fn set(&self, snapshot: ScanSnapshot) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }

    /// Replace only the visible cells.
    pub fn set_cells(&self, cells: Vec<CellPositioningData>) {
        self.snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .cells = cells;
    }

    /// Replace only the visible access points.
    pub fn set_access_points(&self, access_points: Vec<AccessPoint>) {
        self.snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .access_points = access_points;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ScanSnapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl CellSource for StaticScan {
    fn visible_cells(&self) -> Vec<CellPositioningData> {
        self.read().cells.clone()
    }

    fn home_network(&self) -> Option<HomeNetwork> {
        self.read().home_network.clone()
    }
}

impl AccessPointSource for StaticScan {
    fn visible_access_points(&self) -> Vec<AccessPoint> {
        self.read().access_points.clone()
    }
}

/// Access point source for devices without WLAN.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAccessPoints;

impl AccessPointSource for NoAccessPoints {
    fn visible_access_points(&self) -> Vec<AccessPoint> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::UniqueCellId;
    use std::sync::Arc;

    #[test]
    fn test_static_scan_replace_cells() {
        let scan = StaticScan::default();
        assert!(scan.visible_cells().is_empty());

        let cell = CellPositioningData::new(UniqueCellId::new(250, 1, 1, 1), 10);
        scan.set_cells(vec![cell]);
        assert_eq!(scan.visible_cells(), vec![cell]);
    }

    #[test]
    fn test_static_scan_as_trait_objects() {
        let scan = Arc::new(StaticScan::default());
        scan.set_access_points(vec![AccessPoint::new("00:11:22:33:44:55", -50)]);

        let cells: Arc<dyn CellSource> = Arc::clone(&scan) as Arc<dyn CellSource>;
        let aps: Arc<dyn AccessPointSource> = scan;
        assert!(cells.visible_cells().is_empty());
        assert!(cells.home_network().is_none());
        assert_eq!(aps.visible_access_points().len(), 1);
    }

    #[test]
    fn test_no_access_points() {
        assert!(NoAccessPoints.visible_access_points().is_empty());
    }
}

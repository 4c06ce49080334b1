//! Cell tower and access point identity types.
//!
//! These are the value objects produced by every scan: they are rebuilt from
//! collaborator data each time and never mutated in place.
//!
//! - [`UniqueCellId`] - composite key identifying a cell tower
//! - [`CellPositioningData`] - a cell id plus its signal strength right now
//! - [`AccessPoint`] - a visible WLAN access point
//! - [`HomeNetwork`] - SIM home network, used for request metadata
//! - [`Coordinates`] - an immutable geographic position

mod coords;

pub use coords::{weighted_centroid, Coordinates};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Radio access technology of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioType {
    /// 2G GSM.
    Gsm,
    /// 3G UMTS / WCDMA.
    Wcdma,
    /// 4G LTE.
    Lte,
}

impl RadioType {
    /// Name used by the geolocate wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioType::Gsm => "gsm",
            RadioType::Wcdma => "wcdma",
            RadioType::Lte => "lte",
        }
    }

    /// Convert an ASU-style strength (higher is stronger) to dBm.
    ///
    /// GSM and UMTS report 0..=31 where `dBm = -113 + 2 * asu`; LTE reports
    /// 0..=97 where `dBm = -140 + asu`.
    pub fn asu_to_dbm(&self, asu: u32) -> i32 {
        let asu = asu.min(i32::MAX as u32) as i32;
        match self {
            RadioType::Gsm | RadioType::Wcdma => -113 + 2 * asu,
            RadioType::Lte => -140 + asu,
        }
    }
}

impl fmt::Display for RadioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite identifier of a cell tower.
///
/// Equality and ordering use every field, so the same cell id announced on
/// two radio technologies is two different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueCellId {
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u16,
    /// Location area code (TAC on LTE).
    pub lac: u32,
    /// Cell identity.
    pub cell_id: u64,
    /// Radio technology, when the modem reports it.
    #[serde(default)]
    pub radio: Option<RadioType>,
}

impl UniqueCellId {
    /// Create a cell id without radio technology.
    pub fn new(mcc: u16, mnc: u16, lac: u32, cell_id: u64) -> Self {
        Self {
            mcc,
            mnc,
            lac,
            cell_id,
            radio: None,
        }
    }

    /// Set the radio technology.
    pub fn with_radio(mut self, radio: RadioType) -> Self {
        self.radio = Some(radio);
        self
    }
}

impl fmt::Display for UniqueCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.mcc, self.mnc, self.lac, self.cell_id
        )?;
        if let Some(radio) = self.radio {
            write!(f, "/{}", radio)?;
        }
        Ok(())
    }
}

/// A cell seen by the modem during the current scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPositioningData {
    /// Which cell.
    #[serde(flatten)]
    pub unique_cell_id: UniqueCellId,
    /// Relative strength (ASU, higher is stronger).
    pub signal_strength: u32,
}

impl CellPositioningData {
    pub fn new(unique_cell_id: UniqueCellId, signal_strength: u32) -> Self {
        Self {
            unique_cell_id,
            signal_strength,
        }
    }

    /// Signal strength in dBm for the wire format.
    ///
    /// Cells without a known radio are treated as GSM.
    pub fn signal_dbm(&self) -> i32 {
        self.unique_cell_id
            .radio
            .unwrap_or(RadioType::Gsm)
            .asu_to_dbm(self.signal_strength)
    }
}

/// A WLAN access point seen by the network manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    /// BSSID in `aa:bb:cc:dd:ee:ff` form.
    pub bssid: String,
    /// Signal strength in dBm.
    pub signal_dbm: i32,
}

impl AccessPoint {
    pub fn new(bssid: impl Into<String>, signal_dbm: i32) -> Self {
        Self {
            bssid: bssid.into().to_lowercase(),
            signal_dbm,
        }
    }
}

/// Home network of the inserted SIM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeNetwork {
    pub mcc: u16,
    pub mnc: u16,
    /// Operator (service provider) name.
    #[serde(default)]
    pub carrier: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_cell_id_equality_uses_all_fields() {
        let a = UniqueCellId::new(250, 1, 7700, 12345);
        let b = UniqueCellId::new(250, 1, 7700, 12345);
        let c = UniqueCellId::new(250, 1, 7701, 12345);
        let d = a.with_radio(RadioType::Lte);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_cell_id_ordering() {
        let mut set = BTreeSet::new();
        set.insert(UniqueCellId::new(250, 2, 1, 1));
        set.insert(UniqueCellId::new(250, 1, 9, 9));
        set.insert(UniqueCellId::new(244, 5, 1, 1));

        let ordered: Vec<_> = set.into_iter().map(|c| (c.mcc, c.mnc)).collect();
        assert_eq!(ordered, vec![(244, 5), (250, 1), (250, 2)]);
    }

    #[test]
    fn test_cell_id_display() {
        let id = UniqueCellId::new(250, 1, 7700, 12345);
        assert_eq!(id.to_string(), "250-1-7700-12345");
        assert_eq!(
            id.with_radio(RadioType::Wcdma).to_string(),
            "250-1-7700-12345/wcdma"
        );
    }

    #[test]
    fn test_asu_to_dbm() {
        assert_eq!(RadioType::Gsm.asu_to_dbm(0), -113);
        assert_eq!(RadioType::Gsm.asu_to_dbm(31), -51);
        assert_eq!(RadioType::Wcdma.asu_to_dbm(10), -93);
        assert_eq!(RadioType::Lte.asu_to_dbm(40), -100);
    }

    #[test]
    fn test_signal_dbm_defaults_to_gsm() {
        let cell = CellPositioningData::new(UniqueCellId::new(250, 1, 1, 1), 20);
        assert_eq!(cell.signal_dbm(), -73);
    }

    #[test]
    fn test_access_point_bssid_lowercased() {
        let ap = AccessPoint::new("AA:BB:CC:00:11:22", -60);
        assert_eq!(ap.bssid, "aa:bb:cc:00:11:22");
    }

    #[test]
    fn test_cell_positioning_data_deserialize_flat() {
        let json = r#"{"mcc":250,"mnc":1,"lac":7700,"cell_id":12345,"radio":"lte","signal_strength":30}"#;
        let cell: CellPositioningData = serde_json::from_str(json).unwrap();
        assert_eq!(cell.unique_cell_id.radio, Some(RadioType::Lte));
        assert_eq!(cell.signal_strength, 30);
    }
}

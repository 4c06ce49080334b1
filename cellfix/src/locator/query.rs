//! Lookup request construction.
//!
//! A request body is assembled from four field groups:
//!
//! - global fields: home network, carrier, radio type, `considerIp`
//! - cell tower fields: one entry per visible cell
//! - WLAN access point fields: only when permitted and at least
//!   [`MIN_ACCESS_POINTS`] are visible
//! - fallback fields: whether area and IP based estimates are acceptable
//!
//! The JSON layout is the geolocate format shared by Google and the Mozilla
//! Location Service.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::cell::{AccessPoint, CellPositioningData, HomeNetwork, UniqueCellId};

/// WLAN entries are only sent when at least this many access points are
/// visible, so a single access point cannot be used to track its owner.
pub const MIN_ACCESS_POINTS: usize = 2;

/// Geolocate request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_mobile_country_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_mobile_network_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio_type: Option<String>,
    pub consider_ip: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cell_towers: Vec<CellTower>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wifi_access_points: Vec<WifiAccessPoint>,
    pub fallbacks: Fallbacks,
}

/// One cell tower entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTower {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio_type: Option<String>,
    pub mobile_country_code: u16,
    pub mobile_network_code: u16,
    pub location_area_code: u32,
    pub cell_id: u64,
    /// dBm.
    pub signal_strength: i32,
}

impl From<&CellPositioningData> for CellTower {
    fn from(cell: &CellPositioningData) -> Self {
        let id = &cell.unique_cell_id;
        Self {
            radio_type: id.radio.map(|r| r.as_str().to_string()),
            mobile_country_code: id.mcc,
            mobile_network_code: id.mnc,
            location_area_code: id.lac,
            cell_id: id.cell_id,
            signal_strength: cell.signal_dbm(),
        }
    }
}

/// One WLAN access point entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiAccessPoint {
    pub mac_address: String,
    /// dBm.
    pub signal_strength: i32,
}

/// Fallback acceptance flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallbacks {
    /// Location area centroid.
    pub lacf: bool,
    /// IP address based estimate.
    pub ipf: bool,
}

/// Which observations may be put into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub include_cells: bool,
    pub include_access_points: bool,
    pub fallbacks: Fallbacks,
}

/// Observed content of a query, independent of signal strengths.
///
/// Two queries with the same signature would ask the service the same
/// question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    cells: Vec<UniqueCellId>,
    bssids: Vec<String>,
}

impl QuerySignature {
    fn new(mut cells: Vec<UniqueCellId>, mut bssids: Vec<String>) -> Self {
        cells.sort();
        cells.dedup();
        bssids.sort();
        bssids.dedup();
        Self { cells, bssids }
    }

    pub fn cells(&self) -> &[UniqueCellId] {
        &self.cells
    }

    pub fn bssids(&self) -> &[String] {
        &self.bssids
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.bssids.is_empty()
    }
}

/// A lookup request descriptor: id, creation time and body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationQuery {
    id: u64,
    created_at: Instant,
    signature: QuerySignature,
    request: GeolocateRequest,
}

impl LocationQuery {
    /// Assemble a query from the current observations.
    pub fn build(
        id: u64,
        created_at: Instant,
        cells: &[CellPositioningData],
        access_points: &[AccessPoint],
        home_network: Option<&HomeNetwork>,
        options: QueryOptions,
    ) -> Self {
        let cells: &[CellPositioningData] = if options.include_cells { cells } else { &[] };
        let access_points: &[AccessPoint] =
            if options.include_access_points && access_points.len() >= MIN_ACCESS_POINTS {
                access_points
            } else {
                &[]
            };

        let request = GeolocateRequest {
            carrier: home_network.and_then(|h| h.carrier.clone()),
            home_mobile_country_code: home_network.map(|h| h.mcc),
            home_mobile_network_code: home_network.map(|h| h.mnc),
            radio_type: cells
                .first()
                .and_then(|c| c.unique_cell_id.radio)
                .map(|r| r.as_str().to_string()),
            consider_ip: options.fallbacks.ipf,
            cell_towers: cells.iter().map(CellTower::from).collect(),
            wifi_access_points: access_points
                .iter()
                .map(|ap| WifiAccessPoint {
                    mac_address: ap.bssid.clone(),
                    signal_strength: ap.signal_dbm,
                })
                .collect(),
            fallbacks: options.fallbacks,
        };

        let signature = QuerySignature::new(
            cells.iter().map(|c| c.unique_cell_id).collect(),
            access_points.iter().map(|ap| ap.bssid.clone()).collect(),
        );

        Self {
            id,
            created_at,
            signature,
            request,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    pub fn request(&self) -> &GeolocateRequest {
        &self.request
    }

    /// Cell ids included in the request.
    pub fn cell_ids(&self) -> &[UniqueCellId] {
        self.signature.cells()
    }

    /// Whether the request carries no observations at all.
    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }

    /// Serialized request body.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.request)
    }
}

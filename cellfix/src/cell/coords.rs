//! Geographic coordinates and signal-weighted averaging.

use serde::{Deserialize, Serialize};

/// An immutable geographic position.
///
/// A new lookup always produces a new value; nothing updates coordinates in
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// Altitude in meters, when known.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters, when known.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Whether latitude and longitude are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Signal-strength weighted centroid of cell positions.
///
/// Each entry is a cell position and its strength; stronger cells pull the
/// result towards themselves. When every strength is zero the plain mean is
/// returned. The accuracy of the result is the largest accuracy radius among
/// the inputs.
///
/// Inputs are summed in the order given, so callers that need bit-identical
/// results across runs must pass them in a stable order.
///
/// Longitudes are taken relative to the first input, so cells on both sides
/// of the antimeridian average to a point between them. The result is
/// normalised back into [-180, 180].
///
/// Returns `None` for an empty slice.
pub fn weighted_centroid(cells: &[(Coordinates, u32)]) -> Option<Coordinates> {
    if cells.is_empty() {
        return None;
    }

    let total: f64 = cells.iter().map(|(_, s)| *s as f64).sum();
    let weight_of = |strength: u32| -> f64 {
        if total > 0.0 {
            strength as f64 / total
        } else {
            1.0 / cells.len() as f64
        }
    };

    let reference = cells[0].0.longitude;
    let mut latitude = 0.0;
    let mut longitude = 0.0;
    for (coords, strength) in cells {
        let w = weight_of(*strength);
        latitude += coords.latitude * w;
        longitude += unwrap_longitude(coords.longitude, reference) * w;
    }

    let accuracy = cells
        .iter()
        .filter_map(|(c, _)| c.accuracy)
        .fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))));

    Some(Coordinates {
        latitude,
        longitude: normalize_longitude(longitude),
        altitude: None,
        accuracy,
    })
}

/// Shift `longitude` by a full turn so it lies within 180 degrees of `reference`.
fn unwrap_longitude(longitude: f64, reference: f64) -> f64 {
    let delta = longitude - reference;
    if delta > 180.0 {
        longitude - 360.0
    } else if delta < -180.0 {
        longitude + 360.0
    } else {
        longitude
    }
}

fn normalize_longitude(longitude: f64) -> f64 {
    if longitude > 180.0 {
        longitude - 360.0
    } else if longitude < -180.0 {
        longitude + 360.0
    } else {
        longitude
    }
}

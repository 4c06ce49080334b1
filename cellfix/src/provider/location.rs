//! Location values published by the provider.

use std::fmt;

use crate::cell::Coordinates;

use super::status::PositionFields;

/// Where a location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationSource {
    /// Weighted centroid of cached cell positions.
    CellCache,
    /// Precise online lookup.
    Online,
    /// Online lookup answered from an area or IP fallback.
    Fallback,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationSource::CellCache => "cell-cache",
            LocationSource::Online => "online",
            LocationSource::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Location-protocol accuracy levels, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccuracyLevel {
    None = 0,
    Country = 1,
    Region = 2,
    Locality = 3,
    PostalCode = 4,
    Street = 5,
    Detailed = 6,
}

impl AccuracyLevel {
    /// Level for a horizontal accuracy radius in meters.
    pub fn from_radius(radius: f64) -> Self {
        match radius {
            r if !r.is_finite() || r <= 0.0 => AccuracyLevel::None,
            r if r <= 100.0 => AccuracyLevel::Detailed,
            r if r <= 500.0 => AccuracyLevel::Street,
            r if r <= 2_000.0 => AccuracyLevel::PostalCode,
            r if r <= 15_000.0 => AccuracyLevel::Locality,
            r if r <= 100_000.0 => AccuracyLevel::Region,
            _ => AccuracyLevel::Country,
        }
    }
}

/// Accuracy triple reported with a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accuracy {
    pub level: AccuracyLevel,
    /// Horizontal radius in meters, 0 when unknown.
    pub horizontal: f64,
    /// Always 0; altitude is not determined.
    pub vertical: f64,
}

impl Accuracy {
    pub const NONE: Accuracy = Accuracy {
        level: AccuracyLevel::None,
        horizontal: 0.0,
        vertical: 0.0,
    };

    pub fn from_radius(radius: Option<f64>) -> Self {
        match radius {
            Some(r) => Accuracy {
                level: AccuracyLevel::from_radius(r),
                horizontal: r,
                vertical: 0.0,
            },
            None => Accuracy::NONE,
        }
    }
}

/// A computed fix.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Unix seconds.
    pub timestamp: i64,
    pub coordinates: Coordinates,
    pub accuracy: Accuracy,
    pub source: LocationSource,
}

impl Location {
    pub fn new(coordinates: Coordinates, source: LocationSource) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            accuracy: Accuracy::from_radius(coordinates.accuracy),
            coordinates,
            source,
        }
    }

    /// Whether the reported fields (position and accuracy) are the same.
    pub fn same_fix(&self, other: &Location) -> bool {
        self.coordinates.latitude == other.coordinates.latitude
            && self.coordinates.longitude == other.coordinates.longitude
            && self.accuracy == other.accuracy
    }
}

/// `GetPosition` / `PositionChanged` payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub fields: PositionFields,
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: Accuracy,
}

impl PositionReport {
    /// Report with no valid fields.
    pub fn empty() -> Self {
        Self {
            fields: PositionFields::NONE,
            timestamp: 0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            accuracy: Accuracy::NONE,
        }
    }

    pub fn from_location(location: &Location) -> Self {
        Self {
            fields: PositionFields::LATITUDE | PositionFields::LONGITUDE,
            timestamp: location.timestamp,
            latitude: location.coordinates.latitude,
            longitude: location.coordinates.longitude,
            altitude: 0.0,
            accuracy: location.accuracy,
        }
    }

    /// `(fields, timestamp, latitude, longitude, altitude, accuracy)`.
    pub fn into_parts(self) -> (u32, i64, f64, f64, f64, Accuracy) {
        (
            self.fields.bits(),
            self.timestamp,
            self.latitude,
            self.longitude,
            self.altitude,
            self.accuracy,
        )
    }
}

impl From<Option<&Location>> for PositionReport {
    fn from(location: Option<&Location>) -> Self {
        location.map_or_else(PositionReport::empty, PositionReport::from_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_levels() {
        assert_eq!(AccuracyLevel::from_radius(30.0), AccuracyLevel::Detailed);
        assert_eq!(AccuracyLevel::from_radius(300.0), AccuracyLevel::Street);
        assert_eq!(AccuracyLevel::from_radius(1_500.0), AccuracyLevel::PostalCode);
        assert_eq!(AccuracyLevel::from_radius(10_000.0), AccuracyLevel::Locality);
        assert_eq!(AccuracyLevel::from_radius(50_000.0), AccuracyLevel::Region);
        assert_eq!(AccuracyLevel::from_radius(900_000.0), AccuracyLevel::Country);
        assert_eq!(AccuracyLevel::from_radius(f64::NAN), AccuracyLevel::None);
    }

    #[test]
    fn test_report_from_location() {
        let location = Location::new(
            Coordinates::new(55.75, 37.61).with_accuracy(800.0),
            LocationSource::Online,
        );
        let (fields, timestamp, lat, lon, alt, accuracy) =
            PositionReport::from_location(&location).into_parts();

        assert_eq!(fields, 0x03);
        assert!(timestamp > 0);
        assert_eq!((lat, lon, alt), (55.75, 37.61, 0.0));
        assert_eq!(accuracy.level, AccuracyLevel::PostalCode);
        assert_eq!(accuracy.horizontal, 800.0);
    }

    #[test]
    fn test_empty_report() {
        let report = PositionReport::from(None);
        assert!(report.fields.is_empty());
        assert_eq!(report.accuracy, Accuracy::NONE);
    }

    #[test]
    fn test_same_fix_ignores_timestamp_and_source() {
        let a = Location::new(Coordinates::new(1.0, 2.0), LocationSource::CellCache);
        let mut b = Location::new(Coordinates::new(1.0, 2.0), LocationSource::Online);
        b.timestamp += 100;
        assert!(a.same_fix(&b));

        let c = Location::new(Coordinates::new(1.0, 2.0).with_accuracy(5.0), LocationSource::Online);
        assert!(!a.same_fix(&c));
    }
}

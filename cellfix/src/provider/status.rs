//! Provider status and position field flags.

use std::fmt;
use std::ops::BitOr;

/// Provider status as seen by clients.
///
/// ```text
///              scan with usable source        location computed
/// Unavailable ─────────────────────► Acquiring ───────────────► Available
///      ▲                                  ▲                        │
///      │ idle expiry / disabled           └──── fix lost ──────────┘
///      └──────────────────────── any
///
/// any ──► Error     configuration can never produce a fix (sticky)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Error,
    Unavailable,
    Acquiring,
    Available,
}

impl Status {
    /// Wire encoding used by `GetStatus` and `StatusChanged`.
    pub fn code(&self) -> i32 {
        match self {
            Status::Error => 0,
            Status::Unavailable => 1,
            Status::Acquiring => 2,
            Status::Available => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Error),
            1 => Some(Status::Unavailable),
            2 => Some(Status::Acquiring),
            3 => Some(Status::Available),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Error => "error",
            Status::Unavailable => "unavailable",
            Status::Acquiring => "acquiring",
            Status::Available => "available",
        };
        f.write_str(name)
    }
}

/// Bitmask of valid fields in a position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PositionFields(u32);

impl PositionFields {
    pub const NONE: PositionFields = PositionFields(0);
    pub const LATITUDE: PositionFields = PositionFields(0x01);
    pub const LONGITUDE: PositionFields = PositionFields(0x02);
    /// Never set; altitude is not determined.
    pub const ALTITUDE: PositionFields = PositionFields(0x04);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: PositionFields) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PositionFields {
    type Output = PositionFields;

    fn bitor(self, rhs: Self) -> Self::Output {
        PositionFields(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Error.code(), 0);
        assert_eq!(Status::Unavailable.code(), 1);
        assert_eq!(Status::Acquiring.code(), 2);
        assert_eq!(Status::Available.code(), 3);
        for status in [
            Status::Error,
            Status::Unavailable,
            Status::Acquiring,
            Status::Available,
        ] {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(7), None);
    }

    #[test]
    fn test_position_fields() {
        let fields = PositionFields::LATITUDE | PositionFields::LONGITUDE;
        assert_eq!(fields.bits(), 0x03);
        assert!(fields.contains(PositionFields::LATITUDE));
        assert!(!fields.contains(PositionFields::ALTITUDE));
        assert!(PositionFields::NONE.is_empty());
    }
}

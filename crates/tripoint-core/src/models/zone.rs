//! Service-area zones
//!
//! A customer location is classified into a zone by drive time from the
//! nearest dispatch base. Zones A-C are serviceable with fixed pricing;
//! anything further goes to manual review.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Drive-time zone thresholds in minutes
pub const ZONE_A_MAX_MINUTES: f64 = 25.0;
pub const ZONE_B_MAX_MINUTES: f64 = 45.0;
pub const ZONE_C_MAX_MINUTES: f64 = 60.0;

/// Service-area classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    A,
    B,
    C,
    #[serde(rename = "Out of area")]
    OutOfArea,
}

impl Zone {
    /// Classify a drive time in minutes
    pub fn from_drive_time(minutes: f64) -> Self {
        if minutes <= ZONE_A_MAX_MINUTES {
            Zone::A
        } else if minutes <= ZONE_B_MAX_MINUTES {
            Zone::B
        } else if minutes <= ZONE_C_MAX_MINUTES {
            Zone::C
        } else {
            Zone::OutOfArea
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Zone::A),
            "B" => Some(Zone::B),
            "C" => Some(Zone::C),
            "Out of area" => Some(Zone::OutOfArea),
            _ => None,
        }
    }

    /// Whether automated booking is offered for this zone
    pub fn is_serviceable(&self) -> bool {
        !matches!(self, Zone::OutOfArea)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::A => write!(f, "A"),
            Zone::B => write!(f, "B"),
            Zone::C => write!(f, "C"),
            Zone::OutOfArea => write!(f, "Out of area"),
        }
    }
}

/// Route measurement from one base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRoute {
    /// Base address used as the routing origin
    pub address: String,

    /// Drive time in minutes; None if the lookup failed
    pub time_minutes: Option<f64>,

    /// Distance in kilometres; None if the lookup failed
    pub distance_km: Option<f64>,
}

/// Result of classifying a location
///
/// Derived per request; cached briefly but never persisted with the booking
/// beyond the winning drive time and zone letter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneResult {
    /// The location that was classified
    pub postcode: String,

    /// Name of the winning (closest) base
    pub best_base_name: String,

    /// Address of the winning base
    pub best_base_address: String,

    /// Drive time from the winning base, minutes
    pub time_minutes: f64,

    /// Distance from the winning base, kilometres
    pub distance_km: f64,

    /// Assigned zone
    pub zone: Zone,

    /// Per-base measurements, including failed lookups
    pub details: BTreeMap<String, BaseRoute>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_thresholds() {
        assert_eq!(Zone::from_drive_time(10.0), Zone::A);
        assert_eq!(Zone::from_drive_time(25.0), Zone::A);
        assert_eq!(Zone::from_drive_time(25.1), Zone::B);
        assert_eq!(Zone::from_drive_time(45.0), Zone::B);
        assert_eq!(Zone::from_drive_time(45.1), Zone::C);
        assert_eq!(Zone::from_drive_time(60.0), Zone::C);
        assert_eq!(Zone::from_drive_time(60.1), Zone::OutOfArea);
    }

    #[test]
    fn test_zone_display_round_trip() {
        for zone in [Zone::A, Zone::B, Zone::C, Zone::OutOfArea] {
            assert_eq!(Zone::from_str(&zone.to_string()), Some(zone));
        }
    }

    #[test]
    fn test_serviceable() {
        assert!(Zone::A.is_serviceable());
        assert!(Zone::C.is_serviceable());
        assert!(!Zone::OutOfArea.is_serviceable());
    }

    #[test]
    fn test_out_of_area_serde_rename() {
        let json = serde_json::to_string(&Zone::OutOfArea).unwrap();
        assert_eq!(json, "\"Out of area\"");
    }
}

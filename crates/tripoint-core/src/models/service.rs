//! Service catalog
//!
//! The bookable services are a closed enumeration: unknown ids fail fast with
//! a typed error instead of a runtime lookup miss. Definitions are immutable
//! and loaded once as a static table.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::zone::Zone;

/// Identifier of a bookable service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceId {
    DiagnosticCallout,
    VorPriorityTriage,
    VorVanDiagnostics,
    EmissionsFaultDecision,
    AdblueCountdown,
    DpfRegenerationDecision,
    NoxScrDiagnostics,
    SprinterLimpMode,
    IntermittentElectricalFaults,
    MercedesXentryDiagnostics,
    PrePurchaseHealthCheck,
    FleetHealthCheck,
}

impl ServiceId {
    /// All service ids in catalog order
    pub const ALL: [ServiceId; 12] = [
        ServiceId::DiagnosticCallout,
        ServiceId::VorPriorityTriage,
        ServiceId::VorVanDiagnostics,
        ServiceId::EmissionsFaultDecision,
        ServiceId::AdblueCountdown,
        ServiceId::DpfRegenerationDecision,
        ServiceId::NoxScrDiagnostics,
        ServiceId::SprinterLimpMode,
        ServiceId::IntermittentElectricalFaults,
        ServiceId::MercedesXentryDiagnostics,
        ServiceId::PrePurchaseHealthCheck,
        ServiceId::FleetHealthCheck,
    ];

    /// Wire representation of the id
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::DiagnosticCallout => "diagnostic-callout",
            ServiceId::VorPriorityTriage => "vor-priority-triage",
            ServiceId::VorVanDiagnostics => "vor-van-diagnostics",
            ServiceId::EmissionsFaultDecision => "emissions-fault-decision",
            ServiceId::AdblueCountdown => "adblue-countdown",
            ServiceId::DpfRegenerationDecision => "dpf-regeneration-decision",
            ServiceId::NoxScrDiagnostics => "nox-scr-diagnostics",
            ServiceId::SprinterLimpMode => "sprinter-limp-mode",
            ServiceId::IntermittentElectricalFaults => "intermittent-electrical-faults",
            ServiceId::MercedesXentryDiagnostics => "mercedes-xentry-diagnostics",
            ServiceId::PrePurchaseHealthCheck => "pre-purchase-health-check",
            ServiceId::FleetHealthCheck => "fleet-health-check",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-zone fixed prices in whole currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ZonePrices {
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

impl ZonePrices {
    /// Price for a zone; None outside the serviceable zones
    pub fn for_zone(&self, zone: Zone) -> Option<i64> {
        match zone {
            Zone::A => Some(self.a),
            Zone::B => Some(self.b),
            Zone::C => Some(self.c),
            Zone::OutOfArea => None,
        }
    }
}

/// Immutable definition of a bookable service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDefinition {
    /// Service identifier
    pub id: ServiceId,

    /// Customer-facing label
    pub label: &'static str,

    /// On-site duration in minutes
    pub duration_minutes: i32,

    /// Travel buffer contribution in minutes
    pub travel_buffer_minutes: i32,

    /// Minimum notice before the slot start, in hours
    pub min_notice_hours: i64,

    /// Fixed price per zone
    pub zone_price: ZonePrices,
}

const fn def(
    id: ServiceId,
    label: &'static str,
    duration_minutes: i32,
    travel_buffer_minutes: i32,
    min_notice_hours: i64,
    zone_price: ZonePrices,
) -> ServiceDefinition {
    ServiceDefinition {
        id,
        label,
        duration_minutes,
        travel_buffer_minutes,
        min_notice_hours,
        zone_price,
    }
}

/// The static service table
static CATALOG: [ServiceDefinition; 12] = [
    def(
        ServiceId::DiagnosticCallout,
        "Diagnostic Callout (Standard)",
        60,
        20,
        24,
        ZonePrices { a: 120, b: 135, c: 150 },
    ),
    def(
        ServiceId::VorPriorityTriage,
        "VOR / Priority Triage (Commercial)",
        75,
        30,
        0,
        ZonePrices { a: 160, b: 175, c: 190 },
    ),
    def(
        ServiceId::VorVanDiagnostics,
        "VOR Van Diagnostics",
        75,
        30,
        0,
        ZonePrices { a: 160, b: 175, c: 190 },
    ),
    def(
        ServiceId::EmissionsFaultDecision,
        "Emissions Fault Decision Visit (AdBlue/SCR/DPF/NOx)",
        90,
        35,
        24,
        ZonePrices { a: 170, b: 185, c: 200 },
    ),
    def(
        ServiceId::AdblueCountdown,
        "AdBlue Countdown Fix",
        90,
        35,
        24,
        ZonePrices { a: 170, b: 185, c: 200 },
    ),
    def(
        ServiceId::DpfRegenerationDecision,
        "DPF Warning Light Diagnostic",
        90,
        35,
        24,
        ZonePrices { a: 170, b: 185, c: 200 },
    ),
    def(
        ServiceId::NoxScrDiagnostics,
        "NOx Sensor & SCR Diagnostics",
        90,
        35,
        24,
        ZonePrices { a: 170, b: 185, c: 200 },
    ),
    def(
        ServiceId::SprinterLimpMode,
        "Sprinter Limp Mode Diagnostic",
        60,
        20,
        24,
        ZonePrices { a: 120, b: 135, c: 150 },
    ),
    def(
        ServiceId::IntermittentElectricalFaults,
        "Intermittent Electrical Diagnostic",
        60,
        20,
        24,
        ZonePrices { a: 120, b: 135, c: 150 },
    ),
    def(
        ServiceId::MercedesXentryDiagnostics,
        "Mercedes Xentry Diagnostics & Coding",
        60,
        20,
        24,
        ZonePrices { a: 120, b: 135, c: 150 },
    ),
    def(
        ServiceId::PrePurchaseHealthCheck,
        "Pre-Purchase Digital Health Check",
        75,
        30,
        24,
        ZonePrices { a: 160, b: 175, c: 190 },
    ),
    def(
        ServiceId::FleetHealthCheck,
        "Fleet Diagnostic Health Check",
        60,
        20,
        24,
        ZonePrices { a: 120, b: 135, c: 150 },
    ),
];

/// Look up a service definition
pub fn service_definition(id: ServiceId) -> &'static ServiceDefinition {
    // CATALOG is ordered like ServiceId::ALL; validated by tests
    &CATALOG[ServiceId::ALL
        .iter()
        .position(|s| *s == id)
        .expect("service id present in catalog")]
}

/// All service definitions in catalog order
pub fn all_services() -> &'static [ServiceDefinition] {
    &CATALOG
}

/// Resolve a bundle of raw ids into definitions
///
/// Fails with `UnknownService` listing every unrecognized id.
pub fn resolve_bundle(ids: &[String]) -> Result<Vec<&'static ServiceDefinition>, AppError> {
    let unknown: Vec<&str> = ids
        .iter()
        .filter(|raw| ServiceId::from_str(raw).is_none())
        .map(|raw| raw.as_str())
        .collect();

    if !unknown.is_empty() {
        return Err(AppError::UnknownService(unknown.join(", ")));
    }

    Ok(ids
        .iter()
        .filter_map(|raw| ServiceId::from_str(raw))
        .map(service_definition)
        .collect())
}

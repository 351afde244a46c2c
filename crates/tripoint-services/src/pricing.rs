//! Pricing and booking requirements
//!
//! Deterministic computation of visit duration, travel buffer, fixed price,
//! and deposit for a service bundle. Prices are whole currency units here;
//! conversion to minor units happens when the booking row is created.

use chrono::{DateTime, TimeZone, Timelike};
use tripoint_core::models::{resolve_bundle, ServiceDefinition, ServiceId, Zone};
use tripoint_core::AppResult;

use crate::constants::{
    AFTER_HOURS_SURCHARGE, DEPOSIT_PRIORITY, DEPOSIT_STANDARD, EARLY_SURCHARGE_BEFORE_HOUR,
    LATE_CALLOUT_HOUR, LATE_CALLOUT_SURCHARGE, LATE_SURCHARGE_FROM_HOUR,
    MAX_TRAVEL_BUFFER_MINS, MIN_TRAVEL_BUFFER_MINS,
};

/// Duration requirements of a service bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRequirements {
    /// On-site work, minutes
    pub service_duration_mins: i32,

    /// Travel buffer around the visit, minutes
    pub travel_buffer_mins: i32,

    /// On-site work plus buffer, minutes
    pub total_duration_mins: i32,
}

/// Compute duration and buffer requirements for a bundle
///
/// The travel buffer combines the rounded drive time with the per-service
/// buffers, clamped so combined buffers never starve the schedule or
/// under-protect travel time.
pub fn booking_requirements(
    service_ids: &[String],
    drive_time_minutes: f64,
) -> AppResult<BookingRequirements> {
    let services = resolve_bundle(service_ids)?;

    let service_duration_mins: i32 = services.iter().map(|s| s.duration_minutes).sum();
    let service_buffer: i32 = services.iter().map(|s| s.travel_buffer_minutes).sum();
    let drive_component = drive_time_minutes.round() as i32;

    let travel_buffer_mins =
        (drive_component + service_buffer).clamp(MIN_TRAVEL_BUFFER_MINS, MAX_TRAVEL_BUFFER_MINS);

    Ok(BookingRequirements {
        service_duration_mins,
        travel_buffer_mins,
        total_duration_mins: service_duration_mins + travel_buffer_mins,
    })
}

/// Maximum minimum-notice across a bundle, hours
pub fn min_notice_hours(services: &[&ServiceDefinition]) -> i64 {
    services
        .iter()
        .map(|s| s.min_notice_hours)
        .max()
        .unwrap_or(0)
}

/// Fixed price for a bundle in a zone at a slot start
///
/// None outside the serviceable zones. Surcharges are additive: before/after
/// hours (+20) and, independently, the 21:00 standard-callout surcharge (+40).
pub fn fixed_price<Tz: TimeZone>(
    services: &[&ServiceDefinition],
    zone: Zone,
    slot_start_local: &DateTime<Tz>,
) -> Option<i64> {
    if !zone.is_serviceable() {
        return None;
    }

    let mut price: i64 = services
        .iter()
        .filter_map(|s| s.zone_price.for_zone(zone))
        .sum();

    let hour = slot_start_local.hour();
    if hour < EARLY_SURCHARGE_BEFORE_HOUR || hour >= LATE_SURCHARGE_FROM_HOUR {
        price += AFTER_HOURS_SURCHARGE;
    }
    if hour == LATE_CALLOUT_HOUR
        && services.iter().any(|s| s.id == ServiceId::DiagnosticCallout)
    {
        price += LATE_CALLOUT_SURCHARGE;
    }

    Some(price)
}

/// Deposit for a bundle in a zone
///
/// A flat amount independent of bundle size: 50 for zone C or any bundle
/// containing priority triage, else 30. None outside the serviceable zones.
pub fn deposit(services: &[&ServiceDefinition], zone: Zone) -> Option<i64> {
    if !zone.is_serviceable() {
        return None;
    }

    if zone == Zone::C
        || services
            .iter()
            .any(|s| s.id == ServiceId::VorPriorityTriage)
    {
        Some(DEPOSIT_PRIORITY)
    } else {
        Some(DEPOSIT_STANDARD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::London;
    use tripoint_core::models::service_definition;

    fn bundle(ids: &[ServiceId]) -> Vec<&'static ServiceDefinition> {
        ids.iter().map(|id| service_definition(*id)).collect()
    }

    fn london_at(hour: u32) -> DateTime<chrono_tz::Tz> {
        London.with_ymd_and_hms(2026, 8, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_requirements_clamp_lower_bound() {
        // Zero-notice triage from next door: 0 drive + 30 buffer stays at 30
        let req = booking_requirements(&["diagnostic-callout".to_string()], 5.0).unwrap();
        assert_eq!(req.service_duration_mins, 60);
        assert_eq!(req.travel_buffer_mins, 30); // 5 + 20 = 25, clamped up
        assert_eq!(req.total_duration_mins, 90);
    }

    #[test]
    fn test_requirements_clamp_upper_bound() {
        let ids: Vec<String> = vec![
            "emissions-fault-decision".to_string(),
            "adblue-countdown".to_string(),
            "dpf-regeneration-decision".to_string(),
            "nox-scr-diagnostics".to_string(),
            "pre-purchase-health-check".to_string(),
        ];
        // 35*4 + 30 = 170 service buffer + 55 drive = 225, clamped to 180
        let req = booking_requirements(&ids, 55.0).unwrap();
        assert_eq!(req.travel_buffer_mins, 180);
    }

    #[test]
    fn test_requirements_worked_example() {
        // Single standard callout, zone A, 20 minute drive
        let req = booking_requirements(&["diagnostic-callout".to_string()], 20.0).unwrap();
        assert_eq!(req.service_duration_mins, 60);
        assert_eq!(req.travel_buffer_mins, 40); // max(30, min(180, 20 + 20))
        assert_eq!(req.total_duration_mins, 100);
    }

    #[test]
    fn test_requirements_rounds_drive_time() {
        let req = booking_requirements(&["diagnostic-callout".to_string()], 20.4).unwrap();
        assert_eq!(req.travel_buffer_mins, 40);
        let req = booking_requirements(&["diagnostic-callout".to_string()], 20.6).unwrap();
        assert_eq!(req.travel_buffer_mins, 41);
    }

    #[test]
    fn test_requirements_unknown_service() {
        assert!(booking_requirements(&["mystery-visit".to_string()], 10.0).is_err());
    }

    #[test]
    fn test_fixed_price_daytime() {
        let services = bundle(&[ServiceId::DiagnosticCallout]);
        assert_eq!(fixed_price(&services, Zone::A, &london_at(10)), Some(120));
        assert_eq!(fixed_price(&services, Zone::B, &london_at(10)), Some(135));
        assert_eq!(fixed_price(&services, Zone::C, &london_at(10)), Some(150));
    }

    #[test]
    fn test_fixed_price_out_of_area() {
        let services = bundle(&[ServiceId::DiagnosticCallout]);
        assert_eq!(fixed_price(&services, Zone::OutOfArea, &london_at(10)), None);
    }

    #[test]
    fn test_fixed_price_early_and_late_surcharge() {
        let services = bundle(&[ServiceId::SprinterLimpMode]);
        assert_eq!(fixed_price(&services, Zone::A, &london_at(7)), Some(140));
        assert_eq!(fixed_price(&services, Zone::A, &london_at(8)), Some(120));
        assert_eq!(fixed_price(&services, Zone::A, &london_at(18)), Some(120));
        assert_eq!(fixed_price(&services, Zone::A, &london_at(19)), Some(140));
    }

    #[test]
    fn test_fixed_price_late_callout_surcharges_stack() {
        // Zone B callout at 21:00: 135 base + 20 after-hours + 40 late callout
        let services = bundle(&[ServiceId::DiagnosticCallout]);
        assert_eq!(fixed_price(&services, Zone::B, &london_at(21)), Some(195));
    }

    #[test]
    fn test_fixed_price_late_hour_without_callout() {
        // 21:00 without the standard callout: only the after-hours surcharge
        let services = bundle(&[ServiceId::SprinterLimpMode]);
        assert_eq!(fixed_price(&services, Zone::B, &london_at(21)), Some(155));

        // 22:00 zone B non-callout: base + after-hours only
        let services = bundle(&[ServiceId::SprinterLimpMode]);
        assert_eq!(fixed_price(&services, Zone::B, &london_at(22)), Some(155));
    }

    #[test]
    fn test_fixed_price_multi_service_sums() {
        let services = bundle(&[ServiceId::DiagnosticCallout, ServiceId::FleetHealthCheck]);
        assert_eq!(fixed_price(&services, Zone::A, &london_at(10)), Some(240));
    }

    #[test]
    fn test_fixed_price_utc_input() {
        // The hour check runs on whatever timezone the caller supplies
        let start = Utc.with_ymd_and_hms(2026, 8, 10, 21, 0, 0).unwrap();
        let services = bundle(&[ServiceId::DiagnosticCallout]);
        assert_eq!(fixed_price(&services, Zone::B, &start), Some(195));
    }

    #[test]
    fn test_deposit_rules() {
        let standard = bundle(&[ServiceId::DiagnosticCallout]);
        assert_eq!(deposit(&standard, Zone::A), Some(30));
        assert_eq!(deposit(&standard, Zone::B), Some(30));
        assert_eq!(deposit(&standard, Zone::C), Some(50));
        assert_eq!(deposit(&standard, Zone::OutOfArea), None);

        let priority = bundle(&[ServiceId::DiagnosticCallout, ServiceId::VorPriorityTriage]);
        assert_eq!(deposit(&priority, Zone::A), Some(50));
    }

    #[test]
    fn test_min_notice_takes_maximum() {
        let mixed = bundle(&[ServiceId::VorPriorityTriage, ServiceId::DiagnosticCallout]);
        assert_eq!(min_notice_hours(&mixed), 24);

        let triage_only = bundle(&[ServiceId::VorPriorityTriage]);
        assert_eq!(min_notice_hours(&triage_only), 0);

        assert_eq!(min_notice_hours(&[]), 0);
    }
}

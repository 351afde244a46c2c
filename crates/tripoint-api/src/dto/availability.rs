//! Availability DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tripoint_core::models::{Slot, Zone};

/// Query parameters for the availability endpoint
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Customer location
    pub postcode: String,

    /// Comma-joined service ids
    pub service_ids: String,

    /// First day of the requested grid (defaults to today)
    pub from_date: Option<NaiveDate>,
}

/// Availability response: pricing summary plus the full slot grid
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub postcode: String,
    pub zone: Zone,
    pub drive_time_minutes: f64,
    pub travel_buffer_minutes: i32,
    pub service_duration_minutes: i32,
    pub booking_duration_minutes: i32,
    pub fixed_price_gbp: Option<i64>,
    pub deposit_gbp: Option<i64>,
    pub manual_review_required: bool,
    pub slots: Vec<Slot>,
}

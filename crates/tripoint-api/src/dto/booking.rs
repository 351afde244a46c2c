//! Booking DTOs

use serde::{Deserialize, Serialize};
use tripoint_core::models::Zone;
use validator::Validate;

/// Reservation request payload
#[derive(Debug, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(length(min = 1, message = "At least one service must be selected"))]
    pub service_ids: Vec<String>,

    /// RFC 3339 slot start
    pub slot_start_iso: String,

    #[validate(length(min = 2))]
    pub full_name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 7))]
    pub phone: String,

    #[validate(length(min = 3))]
    pub postcode: String,

    #[validate(length(min = 2))]
    pub address_line_1: String,

    #[validate(length(min = 2))]
    pub town_city: String,

    #[validate(length(min = 2))]
    pub vehicle_registration: String,

    #[validate(length(min = 1))]
    pub vehicle_make: String,

    #[validate(length(min = 1))]
    pub vehicle_model: String,

    #[validate(length(min = 1))]
    pub approximate_mileage: String,

    #[validate(length(min = 2))]
    pub symptoms: String,

    pub safe_location_confirmed: bool,

    pub additional_notes: Option<String>,
}

/// Reservation response
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    pub zone: Zone,
    pub fixed_price_gbp: Option<i64>,
    pub deposit_gbp: Option<i64>,
}

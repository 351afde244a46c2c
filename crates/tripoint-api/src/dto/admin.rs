//! Admin DTOs

use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

/// Admin login payload
#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1))]
    pub password: String,
}

/// Filters for the admin bookings list
#[derive(Debug, Deserialize)]
pub struct AdminBookingsQuery {
    /// Booking status filter
    pub status: Option<String>,

    /// Earliest slot date (inclusive)
    pub date_from: Option<NaiveDate>,

    /// Latest slot date (inclusive)
    pub date_to: Option<NaiveDate>,

    /// Row limit
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    200
}

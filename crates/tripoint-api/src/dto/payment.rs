//! Payment-page DTOs

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tripoint_core::models::{service_definition, Booking};

/// Booking summary for the customer payment page
#[derive(Debug, Serialize)]
pub struct PaymentDetailsResponse {
    pub booking_id: String,
    pub status: String,
    pub full_name: String,
    pub service_name: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub booking_date: String,
    pub booking_time_window: String,
    pub vehicle_reg: String,
    pub vehicle_make_model: String,
    pub deposit_gbp: i64,
    pub balance_gbp: i64,
    pub total_gbp: i64,
}

impl PaymentDetailsResponse {
    /// Build the payment-page summary in the business timezone
    pub fn from_booking(booking: &Booking, tz: Tz) -> Self {
        let start_local = booking.slot_start.with_timezone(&tz);
        let end_local = booking.slot_end.with_timezone(&tz);

        let labels: Vec<&str> = booking
            .services()
            .into_iter()
            .map(|id| service_definition(id).label)
            .collect();
        let service_name = if labels.is_empty() {
            "Diagnostic".to_string()
        } else {
            labels.join(", ")
        };

        Self {
            booking_id: booking.id.clone(),
            status: booking.status.to_string(),
            full_name: booking.full_name.clone(),
            service_name,
            slot_start: booking.slot_start,
            slot_end: booking.slot_end,
            booking_date: start_local.format("%A %d %B %Y").to_string(),
            booking_time_window: format!(
                "{} - {}",
                start_local.format("%H:%M"),
                end_local.format("%H:%M")
            ),
            vehicle_reg: booking.vehicle_reg.clone(),
            vehicle_make_model: format!("{} {}", booking.vehicle_make, booking.vehicle_model)
                .trim()
                .to_string(),
            deposit_gbp: booking.deposit_amount / 100,
            balance_gbp: booking.balance_due / 100,
            total_gbp: booking.total_amount / 100,
        }
    }
}

/// Created checkout session redirect
#[derive(Debug, Serialize)]
pub struct CheckoutUrlResponse {
    pub checkout_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;
    use tripoint_core::models::{BookingStatus, Zone};

    #[test]
    fn test_from_booking_formats_window() {
        let start = London
            .with_ymd_and_hms(2026, 8, 12, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let booking = Booking {
            id: "TPB-20260810-AAAA".to_string(),
            status: BookingStatus::PendingDeposit,
            payment_link_token: "tok".to_string(),
            full_name: "Jo Bloggs".to_string(),
            email: "jo@example.com".to_string(),
            phone: "07700900000".to_string(),
            postcode: "TN9 1PP".to_string(),
            address_line_1: String::new(),
            town_city: String::new(),
            vehicle_reg: "AB12CDE".to_string(),
            vehicle_make: "Mercedes".to_string(),
            vehicle_model: "Sprinter".to_string(),
            approx_mileage: String::new(),
            symptoms: String::new(),
            additional_notes: None,
            safe_location: true,
            service_ids: "diagnostic-callout".to_string(),
            slot_start: start,
            slot_end: start + chrono::Duration::minutes(60),
            zone: Zone::A,
            drive_time_mins: 20,
            travel_buffer_mins: 40,
            total_amount: 12_000,
            deposit_amount: 3_000,
            balance_due: 9_000,
            currency: "gbp".to_string(),
            checkout_session_id: None,
            payment_intent_id: None,
            gateway_customer_id: None,
            balance_session_id: None,
            calendar_event_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deposit_paid_at: None,
            completed_at: None,
        };

        let details = PaymentDetailsResponse::from_booking(&booking, London);
        assert_eq!(details.status, "PENDING_DEPOSIT");
        assert_eq!(details.service_name, "Diagnostic Callout (Standard)");
        assert_eq!(details.booking_time_window, "10:00 - 11:00");
        assert_eq!(details.deposit_gbp, 30);
        assert_eq!(details.balance_gbp, 90);
        assert_eq!(details.total_gbp, 120);
    }
}

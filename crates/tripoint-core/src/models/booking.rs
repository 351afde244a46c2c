//! Booking entity and lifecycle states
//!
//! A booking is created by a successful reservation and driven through the
//! deposit/completion/payment lifecycle. Rows are never deleted; cancellation
//! is a status transition.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::service::ServiceId;
use super::slot::BlockedInterval;
use super::zone::Zone;

/// Booking lifecycle status
///
/// Legal transitions:
/// `PendingDeposit -> DepositPaid -> CompletedUnpaid -> CompletedPaid`
/// and `PendingDeposit -> Cancelled` (expiry or explicit cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Slot reserved, deposit not yet paid
    #[default]
    PendingDeposit,
    /// Deposit received, visit committed to the calendar
    DepositPaid,
    /// Visit done, balance outstanding
    CompletedUnpaid,
    /// Fully paid (terminal)
    CompletedPaid,
    /// Hold released by expiry or explicit cancellation (terminal)
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::PendingDeposit => write!(f, "PENDING_DEPOSIT"),
            BookingStatus::DepositPaid => write!(f, "DEPOSIT_PAID"),
            BookingStatus::CompletedUnpaid => write!(f, "COMPLETED_UNPAID"),
            BookingStatus::CompletedPaid => write!(f, "COMPLETED_PAID"),
            BookingStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING_DEPOSIT" => Some(BookingStatus::PendingDeposit),
            "DEPOSIT_PAID" => Some(BookingStatus::DepositPaid),
            "COMPLETED_UNPAID" => Some(BookingStatus::CompletedUnpaid),
            "COMPLETED_PAID" => Some(BookingStatus::CompletedPaid),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the booking still holds its slot against other reservations
    pub fn is_active_hold(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingDeposit | BookingStatus::DepositPaid
        )
    }

    /// Whether no further transitions are legal
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::CompletedPaid | BookingStatus::Cancelled)
    }

    /// State machine edge check
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::PendingDeposit, BookingStatus::DepositPaid)
                | (BookingStatus::PendingDeposit, BookingStatus::Cancelled)
                | (BookingStatus::DepositPaid, BookingStatus::CompletedUnpaid)
                | (BookingStatus::CompletedUnpaid, BookingStatus::CompletedPaid)
        )
    }
}

/// The central persistent booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Booking reference, e.g. `TPB-20260801-3F2A`
    pub id: String,

    /// Current lifecycle status
    pub status: BookingStatus,

    /// Unique token backing the customer payment link
    pub payment_link_token: String,

    // ==================== Customer ====================
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub postcode: String,
    pub address_line_1: String,
    pub town_city: String,

    // ==================== Vehicle ====================
    pub vehicle_reg: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub approx_mileage: String,
    pub symptoms: String,
    pub additional_notes: Option<String>,
    pub safe_location: bool,

    // ==================== Schedule ====================
    /// Comma-joined service ids as booked
    pub service_ids: String,

    /// Slot start (UTC instant)
    pub slot_start: DateTime<Utc>,

    /// Slot end (UTC instant)
    pub slot_end: DateTime<Utc>,

    /// Assigned zone at booking time
    pub zone: Zone,

    /// Drive time from the winning base, minutes
    pub drive_time_mins: i32,

    /// Travel buffer applied around the slot, minutes
    pub travel_buffer_mins: i32,

    // ==================== Money (minor currency units) ====================
    pub total_amount: i64,
    pub deposit_amount: i64,
    pub balance_due: i64,
    pub currency: String,

    // ==================== Payment gateway ====================
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub balance_session_id: Option<String>,

    // ==================== Calendar ====================
    pub calendar_event_id: Option<String>,

    // ==================== Timestamps ====================
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deposit_paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Parsed service ids, skipping anything no longer in the catalog
    pub fn services(&self) -> Vec<ServiceId> {
        self.service_ids
            .split(',')
            .filter_map(ServiceId::from_str)
            .collect()
    }

    /// The interval this booking blocks, expanded by its travel buffer
    pub fn buffered_interval(&self) -> BlockedInterval {
        BlockedInterval::new(
            self.slot_start - chrono::Duration::minutes(i64::from(self.travel_buffer_mins)),
            self.slot_end + chrono::Duration::minutes(i64::from(self.travel_buffer_mins)),
        )
    }

    /// Whether this booking still holds its slot
    pub fn is_active_hold(&self) -> bool {
        self.status.is_active_hold()
    }
}

/// Generate a booking reference: `TPB-YYYYMMDD-XXXX`
pub fn generate_booking_reference(now: DateTime<Utc>) -> String {
    let date_part = now.format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let random_part: String = (0..4)
        .map(|_| {
            char::from_digit(rng.gen_range(0..16u32), 16)
                .unwrap_or('0')
                .to_ascii_uppercase()
        })
        .collect();
    format!("TPB-{}-{}", date_part, random_part)
}

/// Generate a payment-link token (43 URL-safe characters)
pub fn generate_payment_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect()
}

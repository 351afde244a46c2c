//! Payment event records
//!
//! Append-only idempotency ledger for payment-gateway confirmations. A given
//! provider event id is recorded at most once; the record's presence is the
//! sole signal that a mutation already occurred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which booking amount a payment settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Up-front deposit confirming the reservation
    Deposit,
    /// Remaining balance after the visit
    Balance,
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentKind::Deposit => write!(f, "deposit"),
            PaymentKind::Balance => write!(f, "balance"),
        }
    }
}

impl PaymentKind {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(PaymentKind::Deposit),
            "balance" => Some(PaymentKind::Balance),
            _ => None,
        }
    }
}

/// A processed payment-confirmation event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Row identifier
    pub id: Uuid,

    /// Booking the event applies to
    pub booking_id: String,

    /// Unique external event identifier (the idempotency key)
    pub provider_event_id: String,

    /// Provider event type, e.g. `checkout.session.completed`
    pub event_type: String,

    /// Amount in minor currency units, if the provider reported one
    pub amount: Option<i64>,

    /// When the event was recorded
    pub created_at: DateTime<Utc>,
}

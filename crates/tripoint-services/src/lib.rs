//! Business logic services for the TriPoint booking system
//!
//! This crate contains the scheduling and lifecycle core:
//!
//! - `ZoneClassifier` - drive-time zone classification with caching
//! - pricing - booking requirements, fixed prices, deposits
//! - `IntervalStore` - blocked-interval aggregation from calendar and bookings
//! - slots - the deterministic bookable-slot grid generator
//! - `PaymentEventLedger` - at-most-once payment event recording
//! - `BookingManager` - reservation and lifecycle state transitions
//!
//! # Architecture
//!
//! Services are composable and testable:
//! - Each service owns its dependencies (repositories, gateways, cache)
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError

pub mod booking;
pub mod intervals;
pub mod ledger;
pub mod pricing;
pub mod slots;
pub mod zoning;

pub use booking::{BookingManager, ReservationOutcome, ReservationRequest};
pub use intervals::IntervalStore;
pub use ledger::PaymentEventLedger;
pub use zoning::ZoneClassifier;

/// Business logic constants
pub mod constants {
    /// Smallest travel buffer applied around a booking, minutes
    pub const MIN_TRAVEL_BUFFER_MINS: i32 = 30;

    /// Largest travel buffer applied around a booking, minutes
    pub const MAX_TRAVEL_BUFFER_MINS: i32 = 180;

    /// First bookable hour of the working day (local time)
    pub const WORKDAY_START_HOUR: u32 = 6;

    /// End of the working day, exclusive (local time)
    pub const WORKDAY_END_HOUR: u32 = 22;

    /// Rolling booking horizon in days (inclusive of the start day)
    pub const BOOKING_WINDOW_DAYS: i64 = 30;

    /// Slot grid step in minutes
    pub const SLOT_STEP_MINUTES: i64 = 30;

    /// Surcharge for slots before 08:00 or from 19:00, whole currency units
    pub const AFTER_HOURS_SURCHARGE: i64 = 20;

    /// Hour before which the early surcharge applies
    pub const EARLY_SURCHARGE_BEFORE_HOUR: u32 = 8;

    /// Hour from which the late surcharge applies
    pub const LATE_SURCHARGE_FROM_HOUR: u32 = 19;

    /// Additional surcharge for 21:00 standard callouts, whole currency units
    pub const LATE_CALLOUT_SURCHARGE: i64 = 40;

    /// Hour the late-callout surcharge applies to
    pub const LATE_CALLOUT_HOUR: u32 = 21;

    /// Standard deposit, whole currency units
    pub const DEPOSIT_STANDARD: i64 = 30;

    /// Deposit for zone C or priority-triage bundles, whole currency units
    pub const DEPOSIT_PRIORITY: i64 = 50;

    /// Structured tag embedding a buffer override in calendar event notes
    pub const EVENT_BUFFER_TAG: &str = "BUFFER_MIN:";
}

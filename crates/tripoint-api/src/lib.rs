//! API layer for the TriPoint booking system
//!
//! HTTP handlers and DTOs for the public booking surface, the payment-page
//! flow, the webhook receiver, and the admin dashboard.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

use tripoint_cache::RedisCache;
use tripoint_db::{PgBookingRepository, PgPaymentEventRepository};
use tripoint_gateways::{GoogleCalendarClient, WazeRoutingClient};
use tripoint_services::{BookingManager, IntervalStore, ZoneClassifier};

/// Zone classifier as wired in production
pub type Classifier = ZoneClassifier<WazeRoutingClient, RedisCache>;

/// Interval store as wired in production
pub type Intervals = IntervalStore<GoogleCalendarClient, PgBookingRepository>;

/// Booking manager as wired in production
pub type Manager = BookingManager<PgBookingRepository, PgPaymentEventRepository>;

pub use handlers::{
    configure_admin, configure_availability, configure_bookings, configure_payments,
    configure_services, configure_webhooks, configure_zones,
};

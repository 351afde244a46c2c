//! Database layer for the TriPoint booking system
//!
//! Provides the PostgreSQL connection pool and repository implementations
//! for bookings and the payment-event ledger.

pub mod pool;
pub mod repositories;

pub use pool::{create_pool, run_migrations};
pub use repositories::{PgBookingRepository, PgPaymentEventRepository};

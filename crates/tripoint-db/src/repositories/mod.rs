//! Repository implementations

pub mod booking_repo;
pub mod payment_event_repo;

pub use booking_repo::PgBookingRepository;
pub use payment_event_repo::PgPaymentEventRepository;

//! Domain models for the TriPoint booking system

pub mod booking;
pub mod payment;
pub mod service;
pub mod slot;
pub mod zone;

pub use booking::{generate_booking_reference, generate_payment_token, Booking, BookingStatus};
pub use payment::{PaymentEvent, PaymentKind};
pub use service::{
    all_services, resolve_bundle, service_definition, ServiceDefinition, ServiceId, ZonePrices,
};
pub use slot::{BlockedInterval, Slot};
pub use zone::{BaseRoute, Zone, ZoneResult};

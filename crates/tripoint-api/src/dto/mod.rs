//! Request and response DTOs

pub mod admin;
pub mod availability;
pub mod booking;
pub mod payment;

pub use admin::{AdminBookingsQuery, AdminLoginRequest};
pub use availability::{AvailabilityQuery, AvailabilityResponse};
pub use booking::{BookingRequest, BookingResponse};
pub use payment::{CheckoutUrlResponse, PaymentDetailsResponse};

//! External collaborator clients for the TriPoint booking system
//!
//! Implementations of the gateway traits from tripoint-core:
//!
//! - `WazeRoutingClient` - drive-time/distance lookups
//! - `GoogleCalendarClient` - busy events and booking event CRUD
//! - `StripeCheckoutClient` - hosted checkout and webhook verification
//! - `LogMailer` - outbound mail boundary (logs, never fails)
//!
//! Every client converts provider failures to `AppError` at this boundary;
//! no provider error shape escapes into the core.

pub mod calendar;
pub mod mail;
pub mod payments;
pub mod routing;

pub use calendar::GoogleCalendarClient;
pub use mail::LogMailer;
pub use payments::StripeCheckoutClient;
pub use routing::WazeRoutingClient;

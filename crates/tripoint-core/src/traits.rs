//! Common traits for repositories, gateways, and services
//!
//! Defines abstractions for database access and the external collaborators
//! (routing, calendar, payment gateway, mail). Collaborator failures are
//! converted to `AppError` at the implementation boundary; no provider error
//! shape crosses into the core.

use crate::error::AppError;
use crate::models::{BlockedInterval, Booking, BookingStatus, PaymentKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Booking repository
///
/// The slot-overlap check inside `create_reserved` and the row insert are a
/// single atomic unit against the store; computing availability and then
/// inserting as two separate steps is a race and therefore not part of this
/// interface.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Atomically verify the buffered slot is free of active holds and insert
    /// the booking. Fails with `AppError::SlotConflict` when another
    /// PENDING_DEPOSIT or DEPOSIT_PAID booking's buffered interval overlaps.
    async fn create_reserved(&self, booking: &Booking) -> Result<Booking, AppError>;

    /// Find booking by reference
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError>;

    /// Find booking by payment-link token
    async fn find_by_token(&self, token: &str) -> Result<Option<Booking>, AppError>;

    /// Find booking by a checkout session id (deposit or balance)
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Booking>, AppError>;

    /// List bookings with optional filters, newest slot first
    async fn list_filtered(
        &self,
        status: Option<BookingStatus>,
        slot_from: Option<DateTime<Utc>>,
        slot_to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Booking>, AppError>;

    /// Buffered intervals of active holds overlapping the window
    ///
    /// Uses each booking's stored travel buffer, falling back to
    /// `default_buffer_mins` where unset.
    async fn blocked_intervals(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        default_buffer_mins: i32,
    ) -> Result<Vec<BlockedInterval>, AppError>;

    /// Cancel PENDING_DEPOSIT bookings older than the TTL; returns the count.
    /// Safe to run redundantly from concurrent requests.
    async fn expire_pending(&self, ttl_minutes: i64) -> Result<u64, AppError>;

    /// Store the deposit checkout session id before redirecting
    async fn set_deposit_session(&self, id: &str, session_id: &str) -> Result<(), AppError>;

    /// Store the balance checkout session id before redirecting
    async fn set_balance_session(&self, id: &str, session_id: &str) -> Result<(), AppError>;

    /// Transition PENDING_DEPOSIT -> DEPOSIT_PAID, recording gateway and
    /// calendar references
    async fn mark_deposit_paid(
        &self,
        id: &str,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
        gateway_customer_id: Option<&str>,
        calendar_event_id: Option<&str>,
    ) -> Result<(), AppError>;

    /// Transition DEPOSIT_PAID -> COMPLETED_UNPAID
    async fn mark_completed(&self, id: &str) -> Result<(), AppError>;

    /// Transition COMPLETED_UNPAID -> COMPLETED_PAID and zero the balance
    async fn mark_balance_paid(
        &self,
        id: &str,
        balance_session_id: Option<&str>,
    ) -> Result<(), AppError>;
}

/// Payment-event idempotency ledger
#[async_trait]
pub trait PaymentEventRepository: Send + Sync {
    /// Record a processed event. The uniqueness check on
    /// `provider_event_id` and the insert are one atomic operation: the first
    /// call returns `true`, every later call with the same id returns `false`
    /// and performs no mutation.
    async fn record(
        &self,
        booking_id: &str,
        provider_event_id: &str,
        event_type: &str,
        amount: Option<i64>,
    ) -> Result<bool, AppError>;

    /// Whether an event id has already been recorded
    async fn exists(&self, provider_event_id: &str) -> Result<bool, AppError>;
}

/// Drive-time estimate from the routing collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub minutes: f64,
    pub distance_km: f64,
}

/// Drive-time routing collaborator
#[async_trait]
pub trait RoutingGateway: Send + Sync {
    /// Route from a base address to a target location
    ///
    /// Failures are per-call; the zone classifier tolerates individual base
    /// failures and only fails when no base is reachable.
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteEstimate, AppError>;
}

/// A busy event from the external calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusyEvent {
    pub id: String,
    pub summary: String,
    pub notes: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Provider status, e.g. `confirmed` or `cancelled`
    pub status: String,
    /// `transparent` events do not block time
    pub transparency: String,
}

impl BusyEvent {
    /// Whether this event blocks scheduling time
    pub fn is_busy(&self) -> bool {
        self.status != "cancelled" && self.transparency != "transparent"
    }
}

/// Draft of a calendar event to create for a confirmed booking
#[derive(Debug, Clone)]
pub struct CalendarEventDraft {
    pub summary: String,
    pub notes: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
}

/// Calendar collaborator
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// List busy events in the window (paginated internally)
    async fn list_busy_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BusyEvent>, AppError>;

    /// Create an event; returns the opaque event id
    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<String, AppError>;

    /// Recolour an event to reflect a booking status
    async fn update_event_colour(
        &self,
        event_id: &str,
        status: BookingStatus,
    ) -> Result<(), AppError>;

    /// Delete an event
    async fn delete_event(&self, event_id: &str) -> Result<(), AppError>;
}

/// Checkout session request
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub booking_id: String,
    pub token: String,
    pub amount_minor: i64,
    pub customer_email: String,
    pub description: String,
    pub kind: PaymentKind,
}

/// Created checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Verified inbound webhook event, reduced to the fields the core consumes
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Unique external event identifier
    pub id: String,

    /// Provider event type
    pub event_type: String,

    /// Session id the event refers to
    pub session_id: Option<String>,

    /// Booking reference from the session metadata
    pub booking_id: Option<String>,

    /// Payment kind from the session metadata
    pub payment_kind: Option<PaymentKind>,

    /// Total amount in minor currency units
    pub amount_total: Option<i64>,

    /// Payment intent reference
    pub payment_intent_id: Option<String>,

    /// Customer reference
    pub customer_id: Option<String>,
}

/// Payment-gateway collaborator
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError>;

    /// Verify a webhook signature and parse the event
    ///
    /// An unverifiable payload fails with `AppError::InvalidSignature` and
    /// never reaches the booking core.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, AppError>;
}

/// Outbound email message
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub reply_to: Option<String>,
}

/// Outbound mail collaborator
///
/// Delivery is an external concern; booking flows treat send failures as
/// non-fatal and only log them.
#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError>;
}

/// Keyed counter with TTL-windowed eviction
///
/// Backs login rate limiting; injected rather than process-global so state
/// survives multiple workers and can be shared across instances.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, starting a fresh window of
    /// `window_secs` on first increment. Returns the count within the
    /// current window.
    async fn increment(&self, key: &str, window_secs: u64) -> Result<i64, AppError>;
}

/// Cache service abstraction
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
}

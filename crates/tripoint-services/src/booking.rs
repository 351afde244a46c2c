//! Booking lifecycle management
//!
//! Drives a booking from reservation through deposit, completion, and
//! balance payment. Reservation delegates the overlap check plus insert to
//! the repository's atomic primitive; payment confirmations are gated on the
//! payment-event ledger so side effects run at most once, and a confirmation
//! arriving in the wrong source state is recorded then discarded.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tripoint_core::models::{
    generate_booking_reference, generate_payment_token, resolve_bundle, Booking, BookingStatus,
    PaymentKind, ZoneResult,
};
use tripoint_core::traits::{
    BookingRepository, CalendarEventDraft, CalendarGateway, CheckoutRequest, MailGateway,
    MailMessage, PaymentEventRepository, PaymentGateway, WebhookEvent,
};
use tripoint_core::{AppError, AppResult};

use crate::constants::EVENT_BUFFER_TAG;
use crate::ledger::PaymentEventLedger;
use crate::pricing::{booking_requirements, deposit, fixed_price, min_notice_hours};

/// Webhook event type that settles a checkout
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// A reservation request, already validated at the transport layer
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub service_ids: Vec<String>,
    pub slot_start: DateTime<Utc>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub postcode: String,
    pub address_line_1: String,
    pub town_city: String,
    pub vehicle_reg: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub approx_mileage: String,
    pub symptoms: String,
    pub additional_notes: Option<String>,
    pub safe_location_confirmed: bool,
}

/// Result of a reservation attempt
#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    /// Slot reserved and held pending deposit
    Reserved {
        booking: Booking,
        payment_url: String,
        fixed_price: i64,
        deposit: i64,
    },
    /// Location is outside the automated service area
    ManualReview,
}

/// Booking lifecycle manager
pub struct BookingManager<B, P>
where
    B: BookingRepository,
    P: PaymentEventRepository,
{
    bookings: Arc<B>,
    ledger: PaymentEventLedger<P>,
    calendar: Arc<dyn CalendarGateway>,
    payments: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn MailGateway>,
    tz: Tz,
    site_url: String,
    notification_email: String,
    pending_ttl_minutes: i64,
}

impl<B, P> BookingManager<B, P>
where
    B: BookingRepository,
    P: PaymentEventRepository,
{
    /// Create a new booking manager
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<B>,
        payment_events: Arc<P>,
        calendar: Arc<dyn CalendarGateway>,
        payments: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn MailGateway>,
        tz: Tz,
        site_url: String,
        notification_email: String,
        pending_ttl_minutes: i64,
    ) -> Self {
        Self {
            bookings,
            ledger: PaymentEventLedger::new(payment_events),
            calendar,
            payments,
            mailer,
            tz,
            site_url: site_url.trim_end_matches('/').to_string(),
            notification_email,
            pending_ttl_minutes,
        }
    }

    /// Release slots held by stale unpaid reservations
    ///
    /// Best-effort and idempotent; runs opportunistically before each
    /// availability query.
    pub async fn expire_stale(&self) -> AppResult<u64> {
        self.bookings.expire_pending(self.pending_ttl_minutes).await
    }

    /// The business timezone
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Customer payment link for a booking token
    fn payment_url(&self, token: &str) -> String {
        format!("{}/pay/{}", self.site_url, token)
    }

    /// Customer-facing labels for a booking's services
    fn service_labels(booking: &Booking) -> String {
        let labels: Vec<&str> = booking
            .services()
            .into_iter()
            .map(|id| tripoint_core::models::service_definition(id).label)
            .collect();
        if labels.is_empty() {
            "Diagnostic".to_string()
        } else {
            labels.join(", ")
        }
    }

    /// Reserve a slot for a validated request
    ///
    /// Re-derives pricing from the zone classification server-side; a
    /// non-serviceable zone routes to manual review without creating a row.
    /// The overlap check and insert happen atomically in the repository, so
    /// a lost race surfaces as `SlotConflict`.
    #[instrument(skip(self, request, zone), fields(postcode = %request.postcode))]
    pub async fn reserve(
        &self,
        request: &ReservationRequest,
        zone: &ZoneResult,
        now: DateTime<Utc>,
    ) -> AppResult<ReservationOutcome> {
        let services = resolve_bundle(&request.service_ids)?;
        let requirements = booking_requirements(&request.service_ids, zone.time_minutes)?;

        let slot_local = request.slot_start.with_timezone(&self.tz);
        if !(slot_local.minute() == 0 || slot_local.minute() == 30) || slot_local.second() != 0 {
            return Err(AppError::InvalidSlotAlignment);
        }

        let notice = min_notice_hours(&services);
        if request.slot_start < now + Duration::hours(notice) {
            return Err(AppError::InsufficientNotice { hours: notice });
        }

        if !zone.zone.is_serviceable() {
            info!(
                "Out-of-area request from {} ({} mins drive), routing to manual review",
                request.postcode, zone.time_minutes
            );
            self.send_mail(MailMessage {
                to: vec![self.notification_email.clone()],
                subject: "Manual booking review required (out of area)".to_string(),
                html_body: format!(
                    "<p>Out-of-area booking request for {} ({}). Drive time: {} mins.</p>",
                    request.full_name, request.postcode, zone.time_minutes
                ),
                text_body: None,
                reply_to: None,
            })
            .await;
            return Ok(ReservationOutcome::ManualReview);
        }

        let price = fixed_price(&services, zone.zone, &slot_local).unwrap_or(0);
        let deposit_due = deposit(&services, zone.zone).unwrap_or(0);
        let total_minor = price * 100;
        let deposit_minor = deposit_due * 100;

        let token = generate_payment_token();
        let booking = Booking {
            id: generate_booking_reference(now),
            status: BookingStatus::PendingDeposit,
            payment_link_token: token.clone(),
            full_name: request.full_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            postcode: request.postcode.clone(),
            address_line_1: request.address_line_1.clone(),
            town_city: request.town_city.clone(),
            vehicle_reg: request.vehicle_reg.clone(),
            vehicle_make: request.vehicle_make.clone(),
            vehicle_model: request.vehicle_model.clone(),
            approx_mileage: request.approx_mileage.clone(),
            symptoms: request.symptoms.clone(),
            additional_notes: request.additional_notes.clone(),
            safe_location: request.safe_location_confirmed,
            service_ids: request.service_ids.join(","),
            slot_start: request.slot_start,
            slot_end: request.slot_start
                + Duration::minutes(i64::from(requirements.service_duration_mins)),
            zone: zone.zone,
            drive_time_mins: zone.time_minutes.round() as i32,
            travel_buffer_mins: requirements.travel_buffer_mins,
            total_amount: total_minor,
            deposit_amount: deposit_minor,
            balance_due: total_minor - deposit_minor,
            currency: "gbp".to_string(),
            checkout_session_id: None,
            payment_intent_id: None,
            gateway_customer_id: None,
            balance_session_id: None,
            calendar_event_id: None,
            created_at: now,
            updated_at: now,
            deposit_paid_at: None,
            completed_at: None,
        };

        let booking = self.bookings.create_reserved(&booking).await?;
        let payment_url = self.payment_url(&token);

        info!(
            "Reserved {} for {} ({} zone {}, deposit {})",
            booking.id, booking.full_name, booking.slot_start, booking.zone, deposit_due
        );

        let labels = Self::service_labels(&booking);
        let when = slot_local.format("%A %d %B %Y, %H:%M");
        let customer_html = format!(
            "<h2>Slot reserved</h2><p>Hi {},</p>\
             <p>We've reserved your slot for {}.</p>\
             <p>Please pay your deposit of £{} to confirm: <a href='{}'>{}</a></p>\
             <p>Service(s): {}<br/>Zone: {}<br/>Fixed price: £{}<br/>Deposit: £{}</p>\
             <p>Thanks,<br/>TriPoint Diagnostics</p>",
            booking.full_name, when, deposit_due, payment_url, payment_url, labels, booking.zone,
            price, deposit_due
        );
        self.send_mail(MailMessage {
            to: vec![booking.email.clone()],
            subject: "Slot reserved - pay deposit to confirm".to_string(),
            html_body: customer_html.clone(),
            text_body: None,
            reply_to: Some(self.notification_email.clone()),
        })
        .await;
        self.send_mail(MailMessage {
            to: vec![self.notification_email.clone()],
            subject: format!(
                "New booking (pending deposit): {} ({})",
                booking.full_name, booking.postcode
            ),
            html_body: customer_html,
            text_body: None,
            reply_to: None,
        })
        .await;

        Ok(ReservationOutcome::Reserved {
            booking,
            payment_url,
            fixed_price: price,
            deposit: deposit_due,
        })
    }

    /// Apply a verified webhook event
    ///
    /// Unknown event types, missing metadata, and unknown bookings are
    /// acknowledged without error; the gateway already considers the event
    /// delivered.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> AppResult<()> {
        if event.event_type != CHECKOUT_COMPLETED {
            return Ok(());
        }

        let (Some(booking_id), Some(kind)) = (&event.booking_id, event.payment_kind) else {
            warn!("Webhook {} missing booking metadata", event.id);
            return Ok(());
        };

        if self.ledger.exists(&event.id).await? {
            return Ok(());
        }

        let booking = match &event.session_id {
            Some(session_id) => self.bookings.find_by_session(session_id).await?,
            None => None,
        };
        let booking = match booking {
            Some(booking) => Some(booking),
            None => self.bookings.find_by_id(booking_id).await?,
        };
        let Some(booking) = booking else {
            warn!("Webhook {}: booking {} not found", event.id, booking_id);
            return Ok(());
        };

        match kind {
            PaymentKind::Deposit => self.confirm_deposit(booking, event).await,
            PaymentKind::Balance => self.confirm_balance(booking, event).await,
        }
    }

    /// Deposit confirmation: PENDING_DEPOSIT -> DEPOSIT_PAID
    ///
    /// Creates the calendar event exactly once per booking and commits the
    /// transition; both are gated on the first ledger insert.
    async fn confirm_deposit(&self, booking: Booking, event: &WebhookEvent) -> AppResult<()> {
        if booking.status != BookingStatus::PendingDeposit {
            self.ledger
                .record(&booking.id, &event.id, &event.event_type, event.amount_total)
                .await?;
            warn!(
                "Deposit confirmation for {} in state {} treated as already applied",
                booking.id, booking.status
            );
            return Ok(());
        }

        let inserted = self
            .ledger
            .record(&booking.id, &event.id, &event.event_type, event.amount_total)
            .await?;
        if !inserted {
            return Ok(());
        }

        let calendar_event_id = match self
            .calendar
            .create_event(&self.event_draft(&booking))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to create calendar event for {}: {}", booking.id, e);
                None
            }
        };

        let session_id = event
            .session_id
            .as_deref()
            .or(booking.checkout_session_id.as_deref())
            .unwrap_or_default();

        match self
            .bookings
            .mark_deposit_paid(
                &booking.id,
                session_id,
                event.payment_intent_id.as_deref(),
                event.customer_id.as_deref(),
                calendar_event_id.as_deref(),
            )
            .await
        {
            Ok(()) => {}
            Err(AppError::IllegalTransition { .. }) => {
                warn!(
                    "Deposit transition for {} lost a race, discarding",
                    booking.id
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        info!("Deposit confirmed for {}", booking.id);

        let slot_local = booking.slot_start.with_timezone(&self.tz);
        self.send_mail(MailMessage {
            to: vec![booking.email.clone()],
            subject: "Deposit received - booking confirmed".to_string(),
            html_body: format!(
                "<h2>Booking confirmed</h2><p>Hi {},</p>\
                 <p>Your deposit is received and your visit on {} is confirmed.</p>\
                 <p>Booking reference: {}</p>",
                booking.full_name,
                slot_local.format("%A %d %B %Y, %H:%M"),
                booking.id
            ),
            text_body: None,
            reply_to: Some(self.notification_email.clone()),
        })
        .await;

        Ok(())
    }

    /// Balance confirmation: COMPLETED_UNPAID -> COMPLETED_PAID
    async fn confirm_balance(&self, booking: Booking, event: &WebhookEvent) -> AppResult<()> {
        if booking.status != BookingStatus::CompletedUnpaid {
            self.ledger
                .record(&booking.id, &event.id, &event.event_type, event.amount_total)
                .await?;
            warn!(
                "Balance confirmation for {} in state {} treated as already applied",
                booking.id, booking.status
            );
            return Ok(());
        }

        let inserted = self
            .ledger
            .record(&booking.id, &event.id, &event.event_type, event.amount_total)
            .await?;
        if !inserted {
            return Ok(());
        }

        match self
            .bookings
            .mark_balance_paid(&booking.id, event.session_id.as_deref())
            .await
        {
            Ok(()) => {}
            Err(AppError::IllegalTransition { .. }) => {
                warn!(
                    "Balance transition for {} lost a race, discarding",
                    booking.id
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if let Some(event_id) = &booking.calendar_event_id {
            if let Err(e) = self
                .calendar
                .update_event_colour(event_id, BookingStatus::CompletedPaid)
                .await
            {
                warn!("Failed to recolour calendar event for {}: {}", booking.id, e);
            }
        }

        info!("Balance paid for {}", booking.id);

        self.send_mail(MailMessage {
            to: vec![booking.email.clone()],
            subject: "Payment received".to_string(),
            html_body: format!(
                "<h2>Payment received</h2><p>Hi {},</p>\
                 <p>Thanks, your balance of £{} is settled. Booking {} is fully paid.</p>",
                booking.full_name,
                booking.balance_due / 100,
                booking.id
            ),
            text_body: None,
            reply_to: Some(self.notification_email.clone()),
        })
        .await;

        Ok(())
    }

    /// Admin action: DEPOSIT_PAID -> COMPLETED_UNPAID
    #[instrument(skip(self))]
    pub async fn mark_complete(&self, booking_id: &str) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if booking.status != BookingStatus::DepositPaid {
            return Err(AppError::IllegalTransition {
                from: booking.status.to_string(),
                action: "mark_complete".to_string(),
            });
        }

        self.bookings.mark_completed(booking_id).await?;

        if let Some(event_id) = &booking.calendar_event_id {
            if let Err(e) = self
                .calendar
                .update_event_colour(event_id, BookingStatus::CompletedUnpaid)
                .await
            {
                warn!("Failed to recolour calendar event for {}: {}", booking_id, e);
            }
        }

        info!("Booking {} marked complete", booking_id);
        self.require_booking(booking_id).await
    }

    /// Admin override: settle the balance without the payment gateway
    ///
    /// Records a synthetic ledger event so the audit trail matches the
    /// webhook path.
    #[instrument(skip(self))]
    pub async fn admin_mark_paid(&self, booking_id: &str) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if booking.status != BookingStatus::CompletedUnpaid {
            return Err(AppError::IllegalTransition {
                from: booking.status.to_string(),
                action: "mark_paid".to_string(),
            });
        }

        self.ledger
            .record(
                booking_id,
                &format!("admin-mark-paid-{}", booking_id),
                "admin_mark_paid",
                Some(booking.balance_due),
            )
            .await?;
        self.bookings.mark_balance_paid(booking_id, None).await?;

        if let Some(event_id) = &booking.calendar_event_id {
            if let Err(e) = self
                .calendar
                .update_event_colour(event_id, BookingStatus::CompletedPaid)
                .await
            {
                warn!("Failed to recolour calendar event for {}: {}", booking_id, e);
            }
        }

        info!("Booking {} marked paid by admin", booking_id);
        self.require_booking(booking_id).await
    }

    /// Booking summary for the payment page
    ///
    /// Cancelled bookings are gone; anything else with a valid token is
    /// visible.
    pub async fn payment_details(&self, token: &str) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::BookingNotFound("payment link".to_string()))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::BookingCancelled);
        }

        Ok(booking)
    }

    /// Create a deposit checkout session for a payment-link token
    #[instrument(skip(self, token))]
    pub async fn create_deposit_session(&self, token: &str) -> AppResult<String> {
        let booking = self.payment_details(token).await?;

        if booking.status != BookingStatus::PendingDeposit {
            return Err(AppError::IllegalTransition {
                from: booking.status.to_string(),
                action: "deposit_session".to_string(),
            });
        }
        if booking.deposit_amount <= 0 {
            return Err(AppError::InvalidInput("Deposit amount not set".to_string()));
        }

        let slot_local = booking.slot_start.with_timezone(&self.tz);
        let session = self
            .payments
            .create_checkout_session(&CheckoutRequest {
                booking_id: booking.id.clone(),
                token: token.to_string(),
                amount_minor: booking.deposit_amount,
                customer_email: booking.email.clone(),
                description: format!(
                    "Deposit for {} - {}",
                    Self::service_labels(&booking),
                    slot_local.format("%A %d %B %Y")
                ),
                kind: PaymentKind::Deposit,
            })
            .await?;

        self.bookings.set_deposit_session(&booking.id, &session.id).await?;

        Ok(session.url)
    }

    /// Create a balance checkout session for a payment-link token
    #[instrument(skip(self, token))]
    pub async fn create_balance_session(&self, token: &str) -> AppResult<String> {
        let booking = self.payment_details(token).await?;

        if booking.status != BookingStatus::CompletedUnpaid {
            return Err(AppError::IllegalTransition {
                from: booking.status.to_string(),
                action: "balance_session".to_string(),
            });
        }
        if booking.balance_due <= 0 {
            return Err(AppError::InvalidInput("No balance due".to_string()));
        }

        let slot_local = booking.slot_start.with_timezone(&self.tz);
        let session = self
            .payments
            .create_checkout_session(&CheckoutRequest {
                booking_id: booking.id.clone(),
                token: token.to_string(),
                amount_minor: booking.balance_due,
                customer_email: booking.email.clone(),
                description: format!(
                    "Balance for {} - {}",
                    Self::service_labels(&booking),
                    slot_local.format("%A %d %B %Y")
                ),
                kind: PaymentKind::Balance,
            })
            .await?;

        self.bookings.set_balance_session(&booking.id, &session.id).await?;

        Ok(session.url)
    }

    /// List bookings for the admin dashboard
    pub async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
        slot_from: Option<DateTime<Utc>>,
        slot_to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Booking>> {
        self.bookings
            .list_filtered(status, slot_from, slot_to, limit)
            .await
    }

    /// Regenerate the balance payment link and mail it to the customer
    ///
    /// Only meaningful once the visit is complete with balance outstanding.
    #[instrument(skip(self))]
    pub async fn generate_balance_link(&self, booking_id: &str) -> AppResult<String> {
        let booking = self.require_booking(booking_id).await?;

        if booking.status != BookingStatus::CompletedUnpaid {
            return Err(AppError::IllegalTransition {
                from: booking.status.to_string(),
                action: "balance_link".to_string(),
            });
        }

        let payment_url = self.payment_url(&booking.payment_link_token);
        let balance_due = booking.balance_due / 100;

        self.send_mail(MailMessage {
            to: vec![booking.email.clone()],
            subject: "Your balance payment link".to_string(),
            html_body: format!(
                "<p>Hi {},</p><p>The balance of £{} for booking {} is now due.</p>\
                 <p>Pay securely here: <a href='{}'>{}</a></p>",
                booking.full_name, balance_due, booking.id, payment_url, payment_url
            ),
            text_body: None,
            reply_to: Some(self.notification_email.clone()),
        })
        .await;

        Ok(payment_url)
    }

    /// Calendar event draft for a confirmed booking
    fn event_draft(&self, booking: &Booking) -> CalendarEventDraft {
        let notes = format!(
            "Customer: {}\nEmail: {}\nPhone: {}\nPostcode: {}\nAddress: {}, {}\n\
             Vehicle: {} ({} {})\nMileage: {}\nSymptoms: {}\nNotes: {}\nZone: {}\n\
             Drive time: {} mins\nBooking ID: {}\n{}{}",
            booking.full_name,
            booking.email,
            booking.phone,
            booking.postcode,
            booking.address_line_1,
            booking.town_city,
            booking.vehicle_reg,
            booking.vehicle_make,
            booking.vehicle_model,
            booking.approx_mileage,
            booking.symptoms,
            booking.additional_notes.as_deref().unwrap_or("N/A"),
            booking.zone,
            booking.drive_time_mins,
            booking.id,
            EVENT_BUFFER_TAG,
            booking.travel_buffer_mins
        );

        CalendarEventDraft {
            summary: format!(
                "Booking: {} - {}",
                Self::service_labels(booking),
                booking.full_name
            ),
            notes,
            start: booking.slot_start,
            end: booking.slot_end,
            status: BookingStatus::DepositPaid,
        }
    }

    /// Fetch a booking that must exist
    async fn require_booking(&self, booking_id: &str) -> AppResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
    }

    /// Send mail, logging failures; delivery problems never fail a booking
    async fn send_mail(&self, message: MailMessage) {
        if let Err(e) = self.mailer.send(&message).await {
            warn!("Failed to send mail '{}': {}", message.subject, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;
    use std::collections::BTreeMap;
    use std::collections::HashMap;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tripoint_core::models::{BlockedInterval, Zone};
    use tripoint_core::traits::{BusyEvent, CheckoutSession};

    // ==================== Mocks ====================

    #[derive(Default)]
    struct MemoryBookings {
        rows: Mutex<HashMap<String, Booking>>,
    }

    #[async_trait]
    impl BookingRepository for MemoryBookings {
        async fn create_reserved(&self, booking: &Booking) -> AppResult<Booking> {
            let mut rows = self.rows.lock().unwrap();
            let candidate = booking.buffered_interval();
            let conflict = rows
                .values()
                .filter(|b| b.is_active_hold())
                .any(|b| b.buffered_interval().overlaps(&candidate));
            if conflict {
                return Err(AppError::SlotConflict);
            }
            rows.insert(booking.id.clone(), booking.clone());
            Ok(booking.clone())
        }

        async fn find_by_id(&self, id: &str) -> AppResult<Option<Booking>> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }

        async fn find_by_token(&self, token: &str) -> AppResult<Option<Booking>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|b| b.payment_link_token == token)
                .cloned())
        }

        async fn find_by_session(&self, session_id: &str) -> AppResult<Option<Booking>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|b| {
                    b.checkout_session_id.as_deref() == Some(session_id)
                        || b.balance_session_id.as_deref() == Some(session_id)
                })
                .cloned())
        }

        async fn list_filtered(
            &self,
            status: Option<BookingStatus>,
            _slot_from: Option<DateTime<Utc>>,
            _slot_to: Option<DateTime<Utc>>,
            _limit: i64,
        ) -> AppResult<Vec<Booking>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|b| status.map_or(true, |s| b.status == s))
                .cloned()
                .collect())
        }

        async fn blocked_intervals(
            &self,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
            _default_buffer_mins: i32,
        ) -> AppResult<Vec<BlockedInterval>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.is_active_hold())
                .map(|b| b.buffered_interval())
                .collect())
        }

        async fn expire_pending(&self, ttl_minutes: i64) -> AppResult<u64> {
            let cutoff = Utc::now() - Duration::minutes(ttl_minutes);
            let mut rows = self.rows.lock().unwrap();
            let mut expired = 0;
            for booking in rows.values_mut() {
                if booking.status == BookingStatus::PendingDeposit && booking.created_at < cutoff {
                    booking.status = BookingStatus::Cancelled;
                    expired += 1;
                }
            }
            Ok(expired)
        }

        async fn set_deposit_session(&self, id: &str, session_id: &str) -> AppResult<()> {
            if let Some(b) = self.rows.lock().unwrap().get_mut(id) {
                b.checkout_session_id = Some(session_id.to_string());
            }
            Ok(())
        }

        async fn set_balance_session(&self, id: &str, session_id: &str) -> AppResult<()> {
            if let Some(b) = self.rows.lock().unwrap().get_mut(id) {
                b.balance_session_id = Some(session_id.to_string());
            }
            Ok(())
        }

        async fn mark_deposit_paid(
            &self,
            id: &str,
            checkout_session_id: &str,
            payment_intent_id: Option<&str>,
            gateway_customer_id: Option<&str>,
            calendar_event_id: Option<&str>,
        ) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(id) {
                Some(b) if b.status == BookingStatus::PendingDeposit => {
                    b.status = BookingStatus::DepositPaid;
                    b.checkout_session_id = Some(checkout_session_id.to_string());
                    b.payment_intent_id = payment_intent_id.map(String::from);
                    b.gateway_customer_id = gateway_customer_id.map(String::from);
                    b.calendar_event_id = calendar_event_id.map(String::from);
                    b.deposit_paid_at = Some(Utc::now());
                    Ok(())
                }
                _ => Err(AppError::IllegalTransition {
                    from: "unknown".to_string(),
                    action: "deposit_paid".to_string(),
                }),
            }
        }

        async fn mark_completed(&self, id: &str) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(id) {
                Some(b) if b.status == BookingStatus::DepositPaid => {
                    b.status = BookingStatus::CompletedUnpaid;
                    b.completed_at = Some(Utc::now());
                    Ok(())
                }
                _ => Err(AppError::IllegalTransition {
                    from: "unknown".to_string(),
                    action: "mark_complete".to_string(),
                }),
            }
        }

        async fn mark_balance_paid(
            &self,
            id: &str,
            balance_session_id: Option<&str>,
        ) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(id) {
                Some(b) if b.status == BookingStatus::CompletedUnpaid => {
                    b.status = BookingStatus::CompletedPaid;
                    b.balance_due = 0;
                    if let Some(session) = balance_session_id {
                        b.balance_session_id = Some(session.to_string());
                    }
                    Ok(())
                }
                _ => Err(AppError::IllegalTransition {
                    from: "unknown".to_string(),
                    action: "balance_paid".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MemoryEvents {
        seen: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl PaymentEventRepository for MemoryEvents {
        async fn record(
            &self,
            _booking_id: &str,
            provider_event_id: &str,
            _event_type: &str,
            _amount: Option<i64>,
        ) -> AppResult<bool> {
            Ok(self.seen.lock().unwrap().insert(provider_event_id.to_string()))
        }

        async fn exists(&self, provider_event_id: &str) -> AppResult<bool> {
            Ok(self.seen.lock().unwrap().contains(provider_event_id))
        }
    }

    #[derive(Default)]
    struct CountingCalendar {
        created: AtomicUsize,
        recoloured: AtomicUsize,
    }

    #[async_trait]
    impl CalendarGateway for CountingCalendar {
        async fn list_busy_events(
            &self,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> AppResult<Vec<BusyEvent>> {
            Ok(vec![])
        }

        async fn create_event(&self, _draft: &CalendarEventDraft) -> AppResult<String> {
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("cal-evt-{}", n))
        }

        async fn update_event_colour(
            &self,
            _event_id: &str,
            _status: BookingStatus,
        ) -> AppResult<()> {
            self.recoloured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete_event(&self, _event_id: &str) -> AppResult<()> {
            Ok(())
        }
    }

    struct FixedPayments;

    #[async_trait]
    impl PaymentGateway for FixedPayments {
        async fn create_checkout_session(
            &self,
            request: &CheckoutRequest,
        ) -> AppResult<CheckoutSession> {
            Ok(CheckoutSession {
                id: format!("cs_{}", request.kind),
                url: format!("https://pay.example/cs_{}", request.kind),
            })
        }

        fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature_header: &str,
        ) -> AppResult<WebhookEvent> {
            Err(AppError::InvalidSignature)
        }
    }

    #[derive(Default)]
    struct CountingMailer {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl MailGateway for CountingMailer {
        async fn send(&self, _message: &MailMessage) -> AppResult<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // ==================== Helpers ====================

    struct Harness {
        manager: BookingManager<MemoryBookings, MemoryEvents>,
        calendar: Arc<CountingCalendar>,
        mailer: Arc<CountingMailer>,
    }

    fn harness() -> Harness {
        let calendar = Arc::new(CountingCalendar::default());
        let mailer = Arc::new(CountingMailer::default());
        let manager = BookingManager::new(
            Arc::new(MemoryBookings::default()),
            Arc::new(MemoryEvents::default()),
            calendar.clone(),
            Arc::new(FixedPayments),
            mailer.clone(),
            London,
            "https://tripointdiagnostics.co.uk".to_string(),
            "contact@tripointdiagnostics.co.uk".to_string(),
            30,
        );
        Harness {
            manager,
            calendar,
            mailer,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        London
            .with_ymd_and_hms(2026, 6, 10, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    /// 10:00 local, two days out: aligned and clear of every notice period
    fn slot_start() -> DateTime<Utc> {
        London
            .with_ymd_and_hms(2026, 6, 12, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn zone_a() -> ZoneResult {
        ZoneResult {
            postcode: "TN1 1AA".to_string(),
            best_base_name: "Tonbridge".to_string(),
            best_base_address: "TN9 1PP".to_string(),
            time_minutes: 20.0,
            distance_km: 14.0,
            zone: Zone::A,
            details: BTreeMap::new(),
        }
    }

    fn out_of_area() -> ZoneResult {
        ZoneResult {
            zone: Zone::OutOfArea,
            time_minutes: 75.0,
            ..zone_a()
        }
    }

    fn request(slot_start: DateTime<Utc>) -> ReservationRequest {
        ReservationRequest {
            service_ids: vec!["diagnostic-callout".to_string()],
            slot_start,
            full_name: "Jo Bloggs".to_string(),
            email: "jo@example.com".to_string(),
            phone: "07700900000".to_string(),
            postcode: "TN1 1AA".to_string(),
            address_line_1: "1 High St".to_string(),
            town_city: "Tonbridge".to_string(),
            vehicle_reg: "AB12CDE".to_string(),
            vehicle_make: "Mercedes".to_string(),
            vehicle_model: "Sprinter".to_string(),
            approx_mileage: "82000".to_string(),
            symptoms: "Limp mode".to_string(),
            additional_notes: None,
            safe_location_confirmed: true,
        }
    }

    async fn reserved_booking(h: &Harness) -> Booking {
        match h
            .manager
            .reserve(&request(slot_start()), &zone_a(), fixed_now())
            .await
            .unwrap()
        {
            ReservationOutcome::Reserved { booking, .. } => booking,
            ReservationOutcome::ManualReview => panic!("expected reservation"),
        }
    }

    fn deposit_event(booking: &Booking, event_id: &str) -> WebhookEvent {
        WebhookEvent {
            id: event_id.to_string(),
            event_type: CHECKOUT_COMPLETED.to_string(),
            session_id: Some("cs_deposit".to_string()),
            booking_id: Some(booking.id.clone()),
            payment_kind: Some(PaymentKind::Deposit),
            amount_total: Some(booking.deposit_amount),
            payment_intent_id: Some("pi_1".to_string()),
            customer_id: Some("cus_1".to_string()),
        }
    }

    fn balance_event(booking: &Booking, event_id: &str) -> WebhookEvent {
        WebhookEvent {
            id: event_id.to_string(),
            event_type: CHECKOUT_COMPLETED.to_string(),
            session_id: Some("cs_balance".to_string()),
            booking_id: Some(booking.id.clone()),
            payment_kind: Some(PaymentKind::Balance),
            amount_total: Some(booking.balance_due),
            payment_intent_id: None,
            customer_id: None,
        }
    }

    // ==================== Reserve ====================

    #[tokio::test]
    async fn test_reserve_worked_example() {
        let h = harness();
        let outcome = h
            .manager
            .reserve(&request(slot_start()), &zone_a(), fixed_now())
            .await
            .unwrap();

        let ReservationOutcome::Reserved {
            booking,
            payment_url,
            fixed_price,
            deposit,
        } = outcome
        else {
            panic!("expected reservation");
        };

        assert_eq!(fixed_price, 120);
        assert_eq!(deposit, 30);
        assert_eq!(booking.status, BookingStatus::PendingDeposit);
        assert_eq!(booking.total_amount, 12_000);
        assert_eq!(booking.deposit_amount, 3_000);
        assert_eq!(booking.balance_due, 9_000);
        assert_eq!(booking.travel_buffer_mins, 40);
        assert_eq!(booking.drive_time_mins, 20);
        assert_eq!(
            booking.slot_end - booking.slot_start,
            Duration::minutes(60)
        );
        assert!(payment_url.contains("/pay/"));
        assert!(payment_url.ends_with(&booking.payment_link_token));

        // Customer mail plus the internal notification
        assert_eq!(h.mailer.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reserve_rejects_misaligned_slot() {
        let h = harness();
        let start = London
            .with_ymd_and_hms(2026, 6, 12, 10, 15, 0)
            .unwrap()
            .with_timezone(&Utc);
        let err = h
            .manager
            .reserve(&request(start), &zone_a(), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSlotAlignment));
    }

    #[tokio::test]
    async fn test_reserve_rejects_insufficient_notice() {
        let h = harness();
        // 13:00 the same day: inside the callout's 24 hour notice
        let start = London
            .with_ymd_and_hms(2026, 6, 10, 13, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let err = h
            .manager
            .reserve(&request(start), &zone_a(), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientNotice { hours: 24 }));
    }

    #[tokio::test]
    async fn test_reserve_zero_notice_service_books_same_day() {
        let h = harness();
        let start = London
            .with_ymd_and_hms(2026, 6, 10, 13, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let mut req = request(start);
        req.service_ids = vec!["vor-priority-triage".to_string()];

        let outcome = h.manager.reserve(&req, &zone_a(), fixed_now()).await.unwrap();
        assert!(matches!(outcome, ReservationOutcome::Reserved { .. }));
    }

    #[tokio::test]
    async fn test_reserve_unknown_service() {
        let h = harness();
        let mut req = request(slot_start());
        req.service_ids = vec!["mystery-visit".to_string()];
        let err = h
            .manager
            .reserve(&req, &zone_a(), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownService(_)));
    }

    #[tokio::test]
    async fn test_reserve_out_of_area_routes_to_manual_review() {
        let h = harness();
        let outcome = h
            .manager
            .reserve(&request(slot_start()), &out_of_area(), fixed_now())
            .await
            .unwrap();

        assert!(matches!(outcome, ReservationOutcome::ManualReview));
        // Internal notification only; no booking row, no customer mail
        assert_eq!(h.mailer.sent.load(Ordering::SeqCst), 1);
        let rows = h
            .manager
            .bookings
            .list_filtered(None, None, None, 100)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_reserve_overlapping_slot_conflicts() {
        let h = harness();
        let first = reserved_booking(&h).await;

        // Second request 30 minutes later; buffered windows overlap heavily
        let start = first.slot_start + Duration::minutes(30);
        let err = h
            .manager
            .reserve(&request(start), &zone_a(), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));
    }

    // ==================== Deposit ====================

    #[tokio::test]
    async fn test_deposit_confirmation_transitions_and_creates_event() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::DepositPaid);
        assert_eq!(after.calendar_event_id.as_deref(), Some("cal-evt-1"));
        assert_eq!(after.payment_intent_id.as_deref(), Some("pi_1"));
        assert!(after.deposit_paid_at.is_some());
        assert_eq!(h.calendar.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_deposit_event_applies_once() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::DepositPaid);
        // One calendar event despite redelivery
        assert_eq!(h.calendar.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deposit_event_in_wrong_state_discarded() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        // A second, distinct deposit event after the transition
        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_2"))
            .await
            .unwrap();

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::DepositPaid);
        assert_eq!(h.calendar.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_webhook_ignores_other_event_types() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        let mut event = deposit_event(&booking, "evt_1");
        event.event_type = "payment_intent.created".to_string();
        h.manager.handle_webhook(&event).await.unwrap();

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::PendingDeposit);
    }

    #[tokio::test]
    async fn test_webhook_unknown_booking_acknowledged() {
        let h = harness();
        let event = WebhookEvent {
            id: "evt_x".to_string(),
            event_type: CHECKOUT_COMPLETED.to_string(),
            session_id: None,
            booking_id: Some("TPB-00000000-XXXX".to_string()),
            payment_kind: Some(PaymentKind::Deposit),
            amount_total: Some(3000),
            payment_intent_id: None,
            customer_id: None,
        };
        assert!(h.manager.handle_webhook(&event).await.is_ok());
    }

    // ==================== Completion and balance ====================

    #[tokio::test]
    async fn test_mark_complete_requires_deposit_paid() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        let err = h.manager.mark_complete(&booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::PendingDeposit);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        let completed = h.manager.mark_complete(&booking.id).await.unwrap();
        assert_eq!(completed.status, BookingStatus::CompletedUnpaid);

        h.manager
            .handle_webhook(&balance_event(&completed, "evt_2"))
            .await
            .unwrap();

        let finished = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(finished.status, BookingStatus::CompletedPaid);
        assert_eq!(finished.balance_due, 0);
    }

    #[tokio::test]
    async fn test_balance_event_before_completion_discarded() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        // Balance webhook while still DEPOSIT_PAID: recorded, not applied
        h.manager
            .handle_webhook(&balance_event(&booking, "evt_2"))
            .await
            .unwrap();

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.status, BookingStatus::DepositPaid);
        assert_ne!(after.balance_due, 0);
    }

    #[tokio::test]
    async fn test_admin_mark_paid() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        h.manager.mark_complete(&booking.id).await.unwrap();

        let paid = h.manager.admin_mark_paid(&booking.id).await.unwrap();
        assert_eq!(paid.status, BookingStatus::CompletedPaid);
        assert_eq!(paid.balance_due, 0);

        // Second override hits the state guard
        let err = h.manager.admin_mark_paid(&booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_balance_link_only_when_completed_unpaid() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        let err = h.manager.generate_balance_link(&booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        h.manager.mark_complete(&booking.id).await.unwrap();

        let mails_before = h.mailer.sent.load(Ordering::SeqCst);
        let url = h.manager.generate_balance_link(&booking.id).await.unwrap();
        assert!(url.ends_with(&booking.payment_link_token));
        assert_eq!(h.mailer.sent.load(Ordering::SeqCst), mails_before + 1);
    }

    // ==================== Payment sessions ====================

    #[tokio::test]
    async fn test_deposit_session_flow() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        let url = h
            .manager
            .create_deposit_session(&booking.payment_link_token)
            .await
            .unwrap();
        assert_eq!(url, "https://pay.example/cs_deposit");

        let after = h.manager.require_booking(&booking.id).await.unwrap();
        assert_eq!(after.checkout_session_id.as_deref(), Some("cs_deposit"));
    }

    #[tokio::test]
    async fn test_deposit_session_rejected_after_payment() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();

        let err = h
            .manager
            .create_deposit_session(&booking.payment_link_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_balance_session_requires_completed_unpaid() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        let err = h
            .manager
            .create_balance_session(&booking.payment_link_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition { .. }));

        h.manager
            .handle_webhook(&deposit_event(&booking, "evt_1"))
            .await
            .unwrap();
        h.manager.mark_complete(&booking.id).await.unwrap();

        let url = h
            .manager
            .create_balance_session(&booking.payment_link_token)
            .await
            .unwrap();
        assert_eq!(url, "https://pay.example/cs_balance");
    }

    #[tokio::test]
    async fn test_payment_details_for_cancelled_booking() {
        let h = harness();
        let booking = reserved_booking(&h).await;

        // Force-cancel through the expiry path
        {
            let mut rows = h.manager.bookings.rows.lock().unwrap();
            rows.get_mut(&booking.id).unwrap().status = BookingStatus::Cancelled;
        }

        let err = h
            .manager
            .payment_details(&booking.payment_link_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingCancelled));
    }

    #[tokio::test]
    async fn test_payment_details_unknown_token() {
        let h = harness();
        let err = h.manager.payment_details("nope").await.unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }

    // ==================== Event draft ====================

    #[tokio::test]
    async fn test_event_draft_carries_buffer_tag() {
        let h = harness();
        let booking = reserved_booking(&h).await;
        let draft = h.manager.event_draft(&booking);

        assert!(draft.summary.contains("Diagnostic Callout"));
        assert!(draft.summary.contains("Jo Bloggs"));
        assert!(draft.notes.contains(&format!("{}40", EVENT_BUFFER_TAG)));
        assert!(draft.notes.contains(&booking.id));
        assert_eq!(draft.start, booking.slot_start);
        assert_eq!(draft.end, booking.slot_end);
    }
}

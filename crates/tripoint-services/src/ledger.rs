//! Payment-event ledger service
//!
//! Guards every payment confirmation with an at-most-once record. All
//! downstream side effects of a confirmation (state transition, calendar
//! update, email) must be gated on `record` returning `true`.

use std::sync::Arc;
use tracing::{debug, instrument};
use tripoint_core::traits::PaymentEventRepository;
use tripoint_core::AppResult;

/// Idempotency ledger over the payment-event repository
pub struct PaymentEventLedger<P: PaymentEventRepository> {
    repo: Arc<P>,
}

impl<P: PaymentEventRepository> PaymentEventLedger<P> {
    /// Create a new ledger
    pub fn new(repo: Arc<P>) -> Self {
        Self { repo }
    }

    /// Record an external event once
    ///
    /// Returns `true` exactly once per `provider_event_id`; duplicate
    /// deliveries and retries return `false` and perform no mutation.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        booking_id: &str,
        provider_event_id: &str,
        event_type: &str,
        amount: Option<i64>,
    ) -> AppResult<bool> {
        let inserted = self
            .repo
            .record(booking_id, provider_event_id, event_type, amount)
            .await?;

        if !inserted {
            debug!(
                "Duplicate payment event {} for {} discarded",
                provider_event_id, booking_id
            );
        }

        Ok(inserted)
    }

    /// Whether an event id has already been processed
    pub async fn exists(&self, provider_event_id: &str) -> AppResult<bool> {
        self.repo.exists(provider_event_id).await
    }
}

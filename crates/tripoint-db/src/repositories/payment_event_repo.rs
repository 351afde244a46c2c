//! Payment-event ledger repository
//!
//! Append-only idempotency records for payment confirmations. The uniqueness
//! check and the insert are one statement, so duplicate webhook deliveries
//! racing each other cannot both observe "not yet recorded".

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use tripoint_core::{traits::PaymentEventRepository, AppError, AppResult};
use uuid::Uuid;

/// PostgreSQL implementation of PaymentEventRepository
pub struct PgPaymentEventRepository {
    pool: PgPool,
}

impl PgPaymentEventRepository {
    /// Create a new payment-event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentEventRepository for PgPaymentEventRepository {
    #[instrument(skip(self))]
    async fn record(
        &self,
        booking_id: &str,
        provider_event_id: &str,
        event_type: &str,
        amount: Option<i64>,
    ) -> AppResult<bool> {
        debug!(
            "Recording payment event {} for booking {}",
            provider_event_id, booking_id
        );

        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (id, booking_id, provider_event_id, event_type, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider_event_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(provider_event_id)
        .bind(event_type)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error recording payment event: {}", e);
            AppError::Database(format!("Failed to record payment event: {}", e))
        })?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!("Payment event {} already recorded", provider_event_id);
        }

        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn exists(&self, provider_event_id: &str) -> AppResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM payment_events WHERE provider_event_id = $1")
                .bind(provider_event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error checking payment event: {}", e);
                    AppError::Database(format!("Failed to check payment event: {}", e))
                })?;

        Ok(row.is_some())
    }
}

//! Booking repository implementation
//!
//! PostgreSQL-backed storage for bookings. The reservation insert is the
//! critical section: the overlap check against active holds and the row
//! insert run in one transaction under an advisory lock, so two concurrent
//! reservations for overlapping buffered windows cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};
use tripoint_core::{
    models::{BlockedInterval, Booking, BookingStatus, Zone},
    traits::BookingRepository,
    AppError, AppResult,
};

/// Advisory lock key serializing reservation inserts
///
/// All reservations contend on one diary, so a single keyed lock is enough
/// to close the check-then-insert race without table locks.
const RESERVATION_LOCK_KEY: i64 = 0x7452_5053; // "tRPS"

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
}

const BOOKING_COLUMNS: &str = r#"
    id, status, payment_link_token,
    full_name, email, phone, postcode, address_line_1, town_city,
    vehicle_reg, vehicle_make, vehicle_model, approx_mileage,
    symptoms, additional_notes, safe_location,
    service_ids, slot_start, slot_end, zone,
    drive_time_mins, travel_buffer_mins,
    total_amount, deposit_amount, balance_due, currency,
    checkout_session_id, payment_intent_id, gateway_customer_id,
    balance_session_id, calendar_event_id,
    created_at, updated_at, deposit_paid_at, completed_at
"#;

impl PgBookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse booking status from string
    fn parse_status(s: &str) -> BookingStatus {
        BookingStatus::from_str(s).unwrap_or(BookingStatus::Cancelled)
    }

    /// Parse zone from string
    fn parse_zone(s: &str) -> Zone {
        Zone::from_str(s).unwrap_or(Zone::OutOfArea)
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn create_reserved(&self, booking: &Booking) -> AppResult<Booking> {
        debug!("Reserving slot {} for {}", booking.slot_start, booking.id);

        let blocked = booking.buffered_interval();

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Serialize all reservation attempts; released at commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RESERVATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to take reservation lock: {}", e);
                AppError::Database(format!("Failed to take reservation lock: {}", e))
            })?;

        // Overlap check against the buffered windows of active holds
        let conflicts: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM bookings
            WHERE status IN ('PENDING_DEPOSIT', 'DEPOSIT_PAID')
                AND slot_start - make_interval(mins => travel_buffer_mins) < $2
                AND slot_end + make_interval(mins => travel_buffer_mins) > $1
            "#,
        )
        .bind(blocked.start)
        .bind(blocked.end)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed overlap check: {}", e);
            AppError::Database(format!("Failed overlap check: {}", e))
        })?;

        if conflicts.0 > 0 {
            warn!(
                "Slot conflict for {}: {} overlapping active holds",
                booking.id, conflicts.0
            );
            return Err(AppError::SlotConflict);
        }

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            INSERT INTO bookings (
                id, status, payment_link_token,
                full_name, email, phone, postcode, address_line_1, town_city,
                vehicle_reg, vehicle_make, vehicle_model, approx_mileage,
                symptoms, additional_notes, safe_location,
                service_ids, slot_start, slot_end, zone,
                drive_time_mins, travel_buffer_mins,
                total_amount, deposit_amount, balance_due, currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(&booking.id)
        .bind(booking.status.to_string())
        .bind(&booking.payment_link_token)
        .bind(&booking.full_name)
        .bind(&booking.email)
        .bind(&booking.phone)
        .bind(&booking.postcode)
        .bind(&booking.address_line_1)
        .bind(&booking.town_city)
        .bind(&booking.vehicle_reg)
        .bind(&booking.vehicle_make)
        .bind(&booking.vehicle_model)
        .bind(&booking.approx_mileage)
        .bind(&booking.symptoms)
        .bind(&booking.additional_notes)
        .bind(booking.safe_location)
        .bind(&booking.service_ids)
        .bind(booking.slot_start)
        .bind(booking.slot_end)
        .bind(booking.zone.to_string())
        .bind(booking.drive_time_mins)
        .bind(booking.travel_buffer_mins)
        .bind(booking.total_amount)
        .bind(booking.deposit_amount)
        .bind(booking.balance_due)
        .bind(&booking.currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert booking: {}", e);
            AppError::Database(format!("Failed to insert booking: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit reservation: {}", e);
            AppError::Transaction(format!("Failed to commit reservation: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Booking>> {
        let result = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding booking {}: {}", id, e);
            AppError::Database(format!("Failed to find booking: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, token))]
    async fn find_by_token(&self, token: &str) -> AppResult<Option<Booking>> {
        let result = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE payment_link_token = $1",
            BOOKING_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding booking by token: {}", e);
            AppError::Database(format!("Failed to find booking: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_session(&self, session_id: &str) -> AppResult<Option<Booking>> {
        let result = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE checkout_session_id = $1 OR balance_session_id = $1
            "#,
            BOOKING_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding booking by session: {}", e);
            AppError::Database(format!("Failed to find booking: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_filtered(
        &self,
        status: Option<BookingStatus>,
        slot_from: Option<DateTime<Utc>>,
        slot_to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Booking>> {
        debug!("Listing bookings (limit {})", limit);

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE ($1::text IS NULL OR status = $1)
                AND ($2::timestamptz IS NULL OR slot_start >= $2)
                AND ($3::timestamptz IS NULL OR slot_start <= $3)
            ORDER BY slot_start DESC
            LIMIT $4
            "#,
            BOOKING_COLUMNS
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(slot_from)
        .bind(slot_to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing bookings: {}", e);
            AppError::Database(format!("Failed to list bookings: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn blocked_intervals(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        default_buffer_mins: i32,
    ) -> AppResult<Vec<BlockedInterval>> {
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>, Option<i32>)> = sqlx::query_as(
            r#"
            SELECT slot_start, slot_end, travel_buffer_mins
            FROM bookings
            WHERE status IN ('PENDING_DEPOSIT', 'DEPOSIT_PAID')
                AND slot_end > $1
                AND slot_start < $2
            "#,
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching blocked intervals: {}", e);
            AppError::Database(format!("Failed to fetch blocked intervals: {}", e))
        })?;

        Ok(rows
            .into_iter()
            .map(|(start, end, buffer)| {
                let buffer = i64::from(buffer.unwrap_or(default_buffer_mins));
                BlockedInterval::new(
                    start - Duration::minutes(buffer),
                    end + Duration::minutes(buffer),
                )
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn expire_pending(&self, ttl_minutes: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED',
                updated_at = NOW()
            WHERE status = 'PENDING_DEPOSIT'
                AND created_at < NOW() - make_interval(mins => $1)
            "#,
        )
        .bind(ttl_minutes as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error expiring bookings: {}", e);
            AppError::Database(format!("Failed to expire bookings: {}", e))
        })?;

        let expired = result.rows_affected();
        if expired > 0 {
            warn!("Expired {} stale pending bookings", expired);
        }

        Ok(expired)
    }

    #[instrument(skip(self))]
    async fn set_deposit_session(&self, id: &str, session_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET checkout_session_id = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error storing deposit session: {}", e);
            AppError::Database(format!("Failed to store deposit session: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_balance_session(&self, id: &str, session_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET balance_session_id = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error storing balance session: {}", e);
            AppError::Database(format!("Failed to store balance session: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_deposit_paid(
        &self,
        id: &str,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
        gateway_customer_id: Option<&str>,
        calendar_event_id: Option<&str>,
    ) -> AppResult<()> {
        // Status guard in the WHERE clause keeps the transition legal even
        // under concurrent webhook delivery.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'DEPOSIT_PAID',
                checkout_session_id = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                gateway_customer_id = COALESCE($4, gateway_customer_id),
                calendar_event_id = COALESCE($5, calendar_event_id),
                deposit_paid_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING_DEPOSIT'
            "#,
        )
        .bind(id)
        .bind(checkout_session_id)
        .bind(payment_intent_id)
        .bind(gateway_customer_id)
        .bind(calendar_event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error marking deposit paid: {}", e);
            AppError::Database(format!("Failed to mark deposit paid: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::IllegalTransition {
                from: "unknown".to_string(),
                action: "deposit_paid".to_string(),
            });
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'COMPLETED_UNPAID',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'DEPOSIT_PAID'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error marking booking complete: {}", e);
            AppError::Database(format!("Failed to mark booking complete: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::IllegalTransition {
                from: "unknown".to_string(),
                action: "mark_complete".to_string(),
            });
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_balance_paid(&self, id: &str, balance_session_id: Option<&str>) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'COMPLETED_PAID',
                balance_session_id = COALESCE($2, balance_session_id),
                balance_due = 0,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'COMPLETED_UNPAID'
            "#,
        )
        .bind(id)
        .bind(balance_session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error marking balance paid: {}", e);
            AppError::Database(format!("Failed to mark balance paid: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::IllegalTransition {
                from: "unknown".to_string(),
                action: "balance_paid".to_string(),
            });
        }

        Ok(())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    status: String,
    payment_link_token: String,
    full_name: String,
    email: String,
    phone: String,
    postcode: String,
    address_line_1: String,
    town_city: String,
    vehicle_reg: String,
    vehicle_make: String,
    vehicle_model: String,
    approx_mileage: String,
    symptoms: String,
    additional_notes: Option<String>,
    safe_location: bool,
    service_ids: String,
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    zone: String,
    drive_time_mins: i32,
    travel_buffer_mins: i32,
    total_amount: i64,
    deposit_amount: i64,
    balance_due: i64,
    currency: String,
    checkout_session_id: Option<String>,
    payment_intent_id: Option<String>,
    gateway_customer_id: Option<String>,
    balance_session_id: Option<String>,
    calendar_event_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deposit_paid_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            status: PgBookingRepository::parse_status(&row.status),
            payment_link_token: row.payment_link_token,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            postcode: row.postcode,
            address_line_1: row.address_line_1,
            town_city: row.town_city,
            vehicle_reg: row.vehicle_reg,
            vehicle_make: row.vehicle_make,
            vehicle_model: row.vehicle_model,
            approx_mileage: row.approx_mileage,
            symptoms: row.symptoms,
            additional_notes: row.additional_notes,
            safe_location: row.safe_location,
            service_ids: row.service_ids,
            slot_start: row.slot_start,
            slot_end: row.slot_end,
            zone: PgBookingRepository::parse_zone(&row.zone),
            drive_time_mins: row.drive_time_mins,
            travel_buffer_mins: row.travel_buffer_mins,
            total_amount: row.total_amount,
            deposit_amount: row.deposit_amount,
            balance_due: row.balance_due,
            currency: row.currency,
            checkout_session_id: row.checkout_session_id,
            payment_intent_id: row.payment_intent_id,
            gateway_customer_id: row.gateway_customer_id,
            balance_session_id: row.balance_session_id,
            calendar_event_id: row.calendar_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deposit_paid_at: row.deposit_paid_at,
            completed_at: row.completed_at,
        }
    }
}

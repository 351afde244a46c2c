//! Blocked-interval aggregation
//!
//! Collects busy time from two sources over a query window: external
//! calendar events and active bookings. Every interval comes back already
//! expanded by its buffer, ready for the slot generator's overlap checks.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};
use tripoint_core::models::BlockedInterval;
use tripoint_core::traits::{BookingRepository, BusyEvent, CalendarGateway};
use tripoint_core::AppResult;

use crate::constants::EVENT_BUFFER_TAG;

/// Aggregates blocked intervals from the calendar and active bookings
pub struct IntervalStore<C: CalendarGateway, B: BookingRepository> {
    calendar: Arc<C>,
    bookings: Arc<B>,
    shift_markers: Vec<String>,
    shift_buffer_minutes: i64,
}

impl<C: CalendarGateway, B: BookingRepository> IntervalStore<C, B> {
    /// Create a new interval store
    ///
    /// `shift_markers` are lowercased once so event matching stays a cheap
    /// substring scan.
    pub fn new(
        calendar: Arc<C>,
        bookings: Arc<B>,
        shift_markers: Vec<String>,
        shift_buffer_minutes: i64,
    ) -> Self {
        Self {
            calendar,
            bookings,
            shift_markers: shift_markers
                .into_iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            shift_buffer_minutes,
        }
    }

    /// Buffer minutes for a calendar event
    ///
    /// Early/late-shift events (matched case-insensitively against the
    /// marker list) get the fixed shift buffer; otherwise an explicit
    /// `BUFFER_MIN:<n>` tag in the notes wins; otherwise zero.
    fn event_buffer_minutes(&self, event: &BusyEvent) -> i64 {
        let summary = event.summary.to_lowercase();
        if self.shift_markers.iter().any(|m| summary.contains(m)) {
            return self.shift_buffer_minutes;
        }

        parse_buffer_tag(&event.notes).unwrap_or(0)
    }

    /// Collect blocked intervals over `[window_start, window_end]`
    ///
    /// `default_buffer_mins` pads any persisted booking without a stored
    /// travel buffer.
    #[instrument(skip(self))]
    pub async fn blocked_intervals(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        default_buffer_mins: i32,
    ) -> AppResult<Vec<BlockedInterval>> {
        let events = self
            .calendar
            .list_busy_events(window_start, window_end)
            .await?;

        let mut intervals: Vec<BlockedInterval> = events
            .iter()
            .filter(|event| event.is_busy())
            .map(|event| {
                let buffer = Duration::minutes(self.event_buffer_minutes(event));
                BlockedInterval::new(event.start - buffer, event.end + buffer)
            })
            .collect();

        let booked = self
            .bookings
            .blocked_intervals(window_start, window_end, default_buffer_mins)
            .await?;

        debug!(
            "Collected {} calendar + {} booking intervals",
            intervals.len(),
            booked.len()
        );

        intervals.extend(booked);
        Ok(intervals)
    }
}

/// Parse a `BUFFER_MIN:<n>` tag out of free-text notes
fn parse_buffer_tag(notes: &str) -> Option<i64> {
    let index = notes.find(EVENT_BUFFER_TAG)?;
    let digits: String = notes[index + EVENT_BUFFER_TAG.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

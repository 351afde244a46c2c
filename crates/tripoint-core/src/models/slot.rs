//! Slots and blocked intervals
//!
//! A slot is a half-hour-aligned candidate appointment start. A blocked
//! interval is a busy window already expanded by its travel/setup buffer.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A candidate appointment start with its availability flag
///
/// Every candidate in the grid is emitted, available or not; callers must
/// not infer anything from absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Candidate start in the business timezone
    pub start: DateTime<FixedOffset>,

    /// Whether the slot can currently be booked
    pub available: bool,
}

/// A buffer-expanded busy window
///
/// Sourced from calendar busy events and active bookings; recomputed per
/// availability query, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BlockedInterval {
    /// Create an interval; callers are expected to pass `start <= end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Half-open strict overlap test: `a.start < b.end && a.end > b.start`
    ///
    /// Abutting intervals do not overlap.
    pub fn overlaps(&self, other: &BlockedInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whether this interval overlaps the half-open window `[start, end)`
    pub fn overlaps_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

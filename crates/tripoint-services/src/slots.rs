//! Bookable-slot grid generation
//!
//! Produces the full grid of half-hour candidate starts over the rolling
//! booking horizon, each flagged available or not. The generator is pure:
//! identical inputs always yield the identical slot sequence, with no clock
//! access beyond the supplied `now`.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tripoint_core::models::{BlockedInterval, Slot};

use crate::constants::{
    BOOKING_WINDOW_DAYS, SLOT_STEP_MINUTES, WORKDAY_END_HOUR, WORKDAY_START_HOUR,
};

/// Resolve a local wall-clock hour on a date
///
/// On DST transitions an ambiguous time resolves to its earlier occurrence;
/// a non-existent time yields None and the day boundary is skipped.
pub fn local_day_hour(tz: Tz, day: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
    day.and_hms_opt(hour, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
}

/// Generate the slot grid
///
/// Iterates `BOOKING_WINDOW_DAYS + 1` days from `start_day`, stepping every
/// 30 minutes through the [06:00, 22:00) work window. A candidate is
/// unavailable iff any of: it starts in the past; it starts inside the
/// minimum-notice period; it starts beyond the horizon; its buffered window
/// overlaps a blocked interval. All candidates are emitted in chronological
/// order.
pub fn generate_slots(
    now_local: DateTime<Tz>,
    start_day: NaiveDate,
    service_duration_mins: i32,
    travel_buffer_mins: i32,
    min_notice_hours: i64,
    blocked_intervals: &[BlockedInterval],
) -> Vec<Slot> {
    let tz = now_local.timezone();
    let horizon_end = now_local.clone() + Duration::days(BOOKING_WINDOW_DAYS);
    let notice_cutoff = now_local.clone() + Duration::hours(min_notice_hours);

    let service_duration = Duration::minutes(i64::from(service_duration_mins));
    let travel_buffer = Duration::minutes(i64::from(travel_buffer_mins));

    let mut slots = Vec::new();

    for day_offset in 0..=BOOKING_WINDOW_DAYS {
        let current_day = start_day + Duration::days(day_offset);

        let (Some(day_start), Some(day_end)) = (
            local_day_hour(tz, current_day, WORKDAY_START_HOUR),
            local_day_hour(tz, current_day, WORKDAY_END_HOUR),
        ) else {
            continue;
        };

        let mut cursor = day_start;
        while cursor < day_end {
            let booking_start = cursor.with_timezone(&Utc);
            let booking_end = booking_start + service_duration;
            let buffered = BlockedInterval::new(
                booking_start - travel_buffer,
                booking_end + travel_buffer,
            );

            let available = cursor >= now_local
                && cursor >= notice_cutoff
                && cursor <= horizon_end
                && !blocked_intervals.iter().any(|b| b.overlaps(&buffered));

            slots.push(Slot {
                start: cursor.fixed_offset(),
                available,
            });

            cursor = cursor + Duration::minutes(SLOT_STEP_MINUTES);
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::London;

    /// Midsummer noon: no DST transition inside the 31-day window
    fn fixed_now() -> DateTime<Tz> {
        London.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
    }

    fn start_day() -> NaiveDate {
        fixed_now().date_naive()
    }

    /// Local wall-clock time `offset_days` after the fixed now
    ///
    /// June 10 + 30 days stays inside BST, so adding whole days preserves
    /// the wall clock.
    fn utc_at(offset_days: i64, hour: u32, min: u32) -> DateTime<Utc> {
        (London.with_ymd_and_hms(2026, 6, 10, hour, min, 0).unwrap()
            + Duration::days(offset_days))
        .with_timezone(&Utc)
    }

    #[test]
    fn test_grid_shape() {
        let slots = generate_slots(fixed_now(), start_day(), 60, 40, 0, &[]);

        // 31 days x 32 half-hour steps between 06:00 and 22:00
        assert_eq!(slots.len(), 31 * 32);
    }

    #[test]
    fn test_grid_alignment_and_order() {
        let slots = generate_slots(fixed_now(), start_day(), 60, 40, 0, &[]);

        for slot in &slots {
            assert!(slot.start.minute() == 0 || slot.start.minute() == 30);
            assert_eq!(slot.start.second(), 0);
        }
        for pair in slots.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn test_determinism() {
        let blocked = vec![BlockedInterval::new(utc_at(1, 9, 0), utc_at(1, 12, 0))];
        let a = generate_slots(fixed_now(), start_day(), 90, 60, 24, &blocked);
        let b = generate_slots(fixed_now(), start_day(), 90, 60, 24, &blocked);
        assert_eq!(a, b);
    }

    #[test]
    fn test_past_slots_unavailable() {
        let slots = generate_slots(fixed_now(), start_day(), 60, 40, 0, &[]);

        // Day one runs 06:00-21:30; noon "now" leaves the morning in the past
        let morning = &slots[0..12];
        assert!(morning.iter().all(|s| !s.available));

        let afternoon = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(0, 12, 0))
            .unwrap();
        assert!(afternoon.available);
    }

    #[test]
    fn test_min_notice_blocks_near_slots() {
        let slots = generate_slots(fixed_now(), start_day(), 60, 40, 24, &[]);

        // Everything before noon tomorrow is inside the 24h notice period
        let tomorrow_morning = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 11, 30))
            .unwrap();
        assert!(!tomorrow_morning.available);

        let tomorrow_noon = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 12, 0))
            .unwrap();
        assert!(tomorrow_noon.available);
    }

    #[test]
    fn test_horizon_blocks_far_slots() {
        let slots = generate_slots(fixed_now(), start_day(), 60, 40, 0, &[]);

        // Day 31 (offset 30): slots after 12:00 are past now + 30 days
        let last_inside = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(30, 12, 0))
            .unwrap();
        assert!(last_inside.available);

        let first_outside = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(30, 12, 30))
            .unwrap();
        assert!(!first_outside.available);
    }

    #[test]
    fn test_abutting_blocked_interval_keeps_slot_available() {
        // Candidate 12:00 with 60 duration and 30 buffer blocks 11:30-13:30.
        // An interval ending exactly 11:30 abuts and must not disqualify it.
        let blocked = vec![BlockedInterval::new(utc_at(1, 9, 0), utc_at(1, 11, 30))];
        let slots = generate_slots(fixed_now(), start_day(), 60, 30, 0, &blocked);

        let candidate = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 12, 0))
            .unwrap();
        assert!(candidate.available);
    }

    #[test]
    fn test_one_minute_overlap_disqualifies_slot() {
        // Same candidate window, but the interval runs one minute longer
        let blocked = vec![BlockedInterval::new(utc_at(1, 9, 0), utc_at(1, 11, 31))];
        let slots = generate_slots(fixed_now(), start_day(), 60, 30, 0, &blocked);

        let candidate = slots
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 12, 0))
            .unwrap();
        assert!(!candidate.available);
    }

    #[test]
    fn test_blocked_slots_still_emitted() {
        // The whole of day two is blocked; its slots appear, all unavailable
        let blocked = vec![BlockedInterval::new(utc_at(1, 0, 0), utc_at(2, 0, 0))];
        let slots = generate_slots(fixed_now(), start_day(), 60, 30, 0, &blocked);

        assert_eq!(slots.len(), 31 * 32);
        let day_two: Vec<_> = slots
            .iter()
            .filter(|s| s.start.with_timezone(&London).date_naive() == start_day() + Duration::days(1))
            .collect();
        assert_eq!(day_two.len(), 32);
        assert!(day_two.iter().all(|s| !s.available));
    }

    #[test]
    fn test_buffer_widens_conflicts() {
        // 14:00-15:00 busy. With a 30 minute buffer a 13:00+60 visit
        // (blocked 12:30-14:30) collides; with zero buffer it does not.
        let blocked = vec![BlockedInterval::new(utc_at(1, 14, 0), utc_at(1, 15, 0))];

        let wide = generate_slots(fixed_now(), start_day(), 60, 30, 0, &blocked);
        let candidate = wide
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 13, 0))
            .unwrap();
        assert!(!candidate.available);

        let tight = generate_slots(fixed_now(), start_day(), 60, 0, 0, &blocked);
        let candidate = tight
            .iter()
            .find(|s| s.start.with_timezone(&Utc) == utc_at(1, 13, 0))
            .unwrap();
        assert!(candidate.available);
    }
}

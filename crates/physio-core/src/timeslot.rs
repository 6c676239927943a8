//! Time-slot arithmetic.
//!
//! Pure functions for normalizing dates and times, enumerating fixed-width
//! daily slots and detecting overlaps. Intervals are half-open:
//! `[start, start + minutes)`.

use crate::error::{PhysioError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A therapist-independent interval on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub minutes: u32,
}

impl TimeSlot {
    /// Builds a slot, rejecting zero-length intervals and intervals that run
    /// past midnight.
    pub fn new(date: NaiveDate, start: NaiveTime, minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(PhysioError::validation("slot duration must be positive"));
        }
        let start = truncate_to_minute(start);
        if minute_of_day(start) + minutes > MINUTES_PER_DAY {
            return Err(PhysioError::validation(format!(
                "slot starting at {} for {} minutes crosses midnight",
                start.format("%H:%M"),
                minutes
            )));
        }
        Ok(Self {
            date,
            start,
            minutes,
        })
    }

    pub fn start_minute(&self) -> u32 {
        minute_of_day(self.start)
    }

    pub fn end_minute(&self) -> u32 {
        self.start_minute() + self.minutes
    }

    pub fn end(&self) -> NaiveTime {
        self.start + Duration::minutes(i64::from(self.minutes))
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.minutes))
    }

    /// Two slots overlap when they share a date and their half-open intervals
    /// intersect. Back-to-back slots do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date
            && self.start_minute() < other.end_minute()
            && other.start_minute() < self.end_minute()
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.starts_at() <= at && at < self.ends_at()
    }

    /// `HH:MM-HH:MM` label used in conflict messages and agenda views.
    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.date.format("%Y-%m-%d"),
            self.start.format("%H:%M"),
            self.end().format("%H:%M")
        )
    }
}

/// Minutes elapsed since midnight.
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Parses `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| PhysioError::validation(format!("invalid date '{}'", raw)))
}

/// Parses `HH:MM` or `HH:MM:SS`, normalized to whole minutes.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(truncate_to_minute)
        .map_err(|_| PhysioError::validation(format!("invalid time '{}'", raw)))
}

/// Checks a booking duration against the configured allowed set.
pub fn validate_duration(minutes: u32, allowed: &[u32]) -> Result<()> {
    if allowed.contains(&minutes) {
        Ok(())
    } else {
        Err(PhysioError::validation(format!(
            "unsupported duration {} minutes (allowed: {:?})",
            minutes, allowed
        )))
    }
}

/// Enumerates consecutive fixed-width slots in `[day_start, day_end)`.
///
/// A trailing remainder shorter than `width` is not emitted.
pub fn daily_slots(
    date: NaiveDate,
    day_start: NaiveTime,
    day_end: NaiveTime,
    width: u32,
) -> Vec<TimeSlot> {
    if width == 0 {
        return Vec::new();
    }
    let end = minute_of_day(day_end);
    let mut cursor = minute_of_day(day_start);
    let mut slots = Vec::new();

    while cursor + width <= end {
        if let Some(start) = NaiveTime::from_hms_opt(cursor / 60, cursor % 60, 0) {
            slots.push(TimeSlot {
                date,
                start,
                minutes: width,
            });
        }
        cursor += width;
    }
    slots
}

/// Returns the first slot in `booked` overlapping `candidate`, if any.
pub fn first_overlap<'a, I>(candidate: &TimeSlot, booked: I) -> Option<&'a TimeSlot>
where
    I: IntoIterator<Item = &'a TimeSlot>,
{
    booked.into_iter().find(|slot| slot.overlaps(candidate))
}

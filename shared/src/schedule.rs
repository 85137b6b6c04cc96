//! Checkpoint operating windows.
//!
//! A checkpoint is "active" when the local time of day falls inside its
//! window. Windows whose end is earlier than their start run overnight.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AppError, ErrorKind};

pub const MINUTES_PER_DAY: u16 = 24 * 60;
const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeWindowError {
    #[error("'{0}' is not a valid time, expected HH:MM")]
    InvalidTime(String),
    #[error("minute of day {0} is out of range")]
    OutOfRange(u16),
}

impl From<TimeWindowError> for AppError {
    fn from(e: TimeWindowError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Result<Self, TimeWindowError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(TimeWindowError::OutOfRange(minutes));
        }
        Ok(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Result<Self, TimeWindowError> {
        if hour >= 24 || minute >= 60 {
            return Err(TimeWindowError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    /// Accepts `HH:MM` from the editor and `HH:MM:SS` from the backend.
    pub fn parse(raw: &str) -> Result<Self, TimeWindowError> {
        let trimmed = raw.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .map_err(|_| TimeWindowError::InvalidTime(raw.to_string()))?;
        #[allow(clippy::cast_possible_truncation)]
        let minutes = (time.hour() * 60 + time.minute()) as u16;
        Ok(Self(minutes))
    }

    /// Local time of day for a unix timestamp at a fixed UTC offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn at(unix_ms: u64, utc_offset_minutes: i32) -> Self {
        let minutes = (unix_ms / MS_PER_MINUTE) as i64 + i64::from(utc_offset_minutes);
        Self(minutes.rem_euclid(i64::from(MINUTES_PER_DAY)) as u16)
    }

    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn label(self) -> String {
        format!("{:02}:{:02}", self.0 / 60, self.0 % 60)
    }

    /// `HH:MM:SS`, the shape the backend's time fields accept.
    #[must_use]
    pub fn wire(self) -> String {
        format!("{}:00", self.label())
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.label()
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeWindowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeWindowError> {
        Ok(Self::new(TimeOfDay::parse(start)?, TimeOfDay::parse(end)?))
    }

    #[must_use]
    pub fn spans_midnight(self) -> bool {
        self.end < self.start
    }

    /// Both bounds are inclusive.
    #[must_use]
    pub fn contains(self, now: TimeOfDay) -> bool {
        if self.spans_midnight() {
            now >= self.start || now <= self.end
        } else {
            self.start <= now && now <= self.end
        }
    }

    #[must_use]
    pub fn label(self) -> String {
        format!("{} - {}", self.start, self.end)
    }
}

#[must_use]
pub fn is_window_active(start: TimeOfDay, end: TimeOfDay, now: TimeOfDay) -> bool {
    TimeWindow::new(start, end).contains(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(raw: &str) -> TimeOfDay {
        TimeOfDay::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(t("06:30").minutes(), 390);
        assert_eq!(t("22:00:00").minutes(), 1320);
        assert_eq!(t(" 00:00 ").minutes(), 0);
        assert!(TimeOfDay::parse("24:00").is_err());
        assert!(TimeOfDay::parse("7pm").is_err());
        assert!(TimeOfDay::parse("").is_err());
    }

    #[test]
    fn test_overnight_window() {
        let window = TimeWindow::parse("22:00", "06:00").unwrap();
        assert!(window.spans_midnight());
        assert!(window.contains(t("23:00")));
        assert!(window.contains(t("03:15")));
        assert!(!window.contains(t("12:00")));
        assert!(window.contains(t("22:00")));
        assert!(window.contains(t("06:00")));
        assert!(!window.contains(t("06:01")));
    }

    #[test]
    fn test_daytime_window() {
        let window = TimeWindow::parse("08:00", "17:00").unwrap();
        assert!(!window.spans_midnight());
        assert!(window.contains(t("08:00")));
        assert!(window.contains(t("12:00")));
        assert!(window.contains(t("17:00")));
        assert!(!window.contains(t("17:01")));
        assert!(!window.contains(t("07:59")));
    }

    #[test]
    fn test_zero_length_window() {
        let window = TimeWindow::parse("09:00", "09:00").unwrap();
        assert!(window.contains(t("09:00")));
        assert!(!window.contains(t("09:01")));
    }

    #[test]
    fn test_local_time_from_unix() {
        // 2024-01-01T15:30:00Z is 23:30 in Manila (+08:00).
        let ms = 1_704_123_000_000;
        assert_eq!(TimeOfDay::at(ms, 480).label(), "23:30");
        assert_eq!(TimeOfDay::at(ms, 0).label(), "15:30");
        assert_eq!(TimeOfDay::at(ms, -16 * 60).label(), "23:30");
    }

    #[test]
    fn test_serde_as_label() {
        let json = serde_json::to_string(&t("07:05")).unwrap();
        assert_eq!(json, "\"07:05\"");
        let back: TimeOfDay = serde_json::from_str("\"07:05:00\"").unwrap();
        assert_eq!(back, t("07:05"));
        assert_eq!(t("07:05").wire(), "07:05:00");
    }

    proptest! {
        #[test]
        fn prop_window_matches_definition(
            start in 0u16..MINUTES_PER_DAY,
            end in 0u16..MINUTES_PER_DAY,
            now in 0u16..MINUTES_PER_DAY,
        ) {
            let window = TimeWindow::new(
                TimeOfDay::from_minutes(start).unwrap(),
                TimeOfDay::from_minutes(end).unwrap(),
            );
            let expected = if end < start {
                now >= start || now <= end
            } else {
                start <= now && now <= end
            };
            prop_assert_eq!(window.contains(TimeOfDay::from_minutes(now).unwrap()), expected);
        }

        #[test]
        fn prop_overnight_window_is_complement_of_gap(
            start in 1u16..MINUTES_PER_DAY,
            gap in 1u16..MINUTES_PER_DAY,
            now in 0u16..MINUTES_PER_DAY,
        ) {
            // [start, end] overnight is active exactly where the daytime gap
            // (end, start) is not.
            let end = start.saturating_sub(gap.min(start)).min(start - 1);
            let window = TimeWindow::new(
                TimeOfDay::from_minutes(start).unwrap(),
                TimeOfDay::from_minutes(end).unwrap(),
            );
            let in_gap = now > end && now < start;
            prop_assert_eq!(window.contains(TimeOfDay::from_minutes(now).unwrap()), !in_gap);
        }
    }
}

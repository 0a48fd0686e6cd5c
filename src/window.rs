//! Query windows and the seconds ↔ wall-clock codec
//!
//! The portal filters by hour, minute, and second drop-downs. Internally a window is a
//! pair of 1-based second offsets into the civil day, so second 1 is `00:00:00` and
//! second 86400 is `23:59:59`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Number of seconds in a civil day; also the last valid 1-based second offset
pub const DAY_SECONDS: u32 = 86_400;

/// Wall-clock time of day as shown in the portal's drop-downs
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Clock {
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub minute: u32,
    /// Second, 0-59
    pub second: u32,
}

impl Clock {
    /// Create a clock value, rejecting out-of-range components
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return Err(Error::InvalidClock {
                hour,
                minute,
                second,
            });
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Zero-padded `HH`
    pub fn hour_str(&self) -> String {
        format!("{:02}", self.hour)
    }

    /// Zero-padded `MM`
    pub fn minute_str(&self) -> String {
        format!("{:02}", self.minute)
    }

    /// Zero-padded `SS`
    pub fn second_str(&self) -> String {
        format!("{:02}", self.second)
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Convert a 1-based second offset into a wall-clock time.
///
/// Returns `None` outside `1..=86400`.
pub fn seconds_to_clock(s: u32) -> Option<Clock> {
    (1..=DAY_SECONDS).contains(&s).then(|| clock_of(s))
}

// Caller guarantees `s` is in `1..=86400`.
fn clock_of(s: u32) -> Clock {
    let offset = s - 1;
    Clock {
        hour: offset / 3600,
        minute: (offset % 3600) / 60,
        second: offset % 60,
    }
}

/// Convert a wall-clock time back into its 1-based second offset
pub fn clock_to_seconds(clock: Clock) -> u32 {
    clock.hour * 3600 + clock.minute * 60 + clock.second + 1
}

/// A contiguous range of seconds within one calendar day.
///
/// Invariant: `1 <= start <= end <= 86400`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct QueryWindow {
    day: NaiveDate,
    start: u32,
    end: u32,
}

impl QueryWindow {
    /// Create a window, validating the bounds
    pub fn new(day: NaiveDate, start: u32, end: u32) -> Result<Self> {
        if start < 1 || start > end || end > DAY_SECONDS {
            return Err(Error::InvalidWindow { start, end });
        }
        Ok(Self { day, start, end })
    }

    /// The whole day, `[1, 86400]`
    pub fn full_day(day: NaiveDate) -> Self {
        Self {
            day,
            start: 1,
            end: DAY_SECONDS,
        }
    }

    /// Calendar day the window belongs to
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// First second (1-based, inclusive)
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last second (1-based, inclusive)
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of seconds covered
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Windows always cover at least one second
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the window has collapsed to a single second
    pub fn is_single_second(&self) -> bool {
        self.start == self.end
    }

    /// Whether the window reaches the end of the day
    pub fn reaches_end_of_day(&self) -> bool {
        self.end == DAY_SECONDS
    }

    /// Wall-clock start time
    pub fn start_clock(&self) -> Clock {
        clock_of(self.start)
    }

    /// Wall-clock end time
    pub fn end_clock(&self) -> Clock {
        clock_of(self.end)
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day,
            self.start_clock(),
            self.end_clock()
        )
    }
}

//! Time primitives shared by every clock component.
//!
//! Two clocks meet in this crate: calendar time expressed as [`Timestamp`]
//! (whole seconds since the Unix epoch, as delivered by the radio decoder and
//! the backup clock), and the wrapping monotonic millisecond counter that
//! paces the scheduler ([`Millis`]). [`CivilDateTime`] converts between the
//! former and a proleptic Gregorian breakdown without any lookup tables so the
//! same code runs on the MCU and on the host.

use core::fmt;
use core::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_DAY: u64 = 86_400;

/// Whole seconds since 1970-01-01T00:00:00Z.
///
/// Zero doubles as the "no value" sentinel: collaborators report it when
/// they have nothing to offer, and the core never adopts it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Sentinel meaning "no time available".
    pub const UNSET: Self = Self(0);

    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Returns `true` for the zero sentinel.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Filters out the zero sentinel.
    #[must_use]
    pub const fn non_zero(self) -> Option<Self> {
        if self.is_unset() { None } else { Some(self) }
    }

    /// Index of the calendar minute containing this instant.
    #[must_use]
    pub const fn whole_minutes(self) -> u64 {
        self.0 / SECONDS_PER_MINUTE
    }

    /// Adds whole seconds, saturating at the representable maximum.
    #[must_use]
    pub const fn saturating_add_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Shifts the instant by a signed number of seconds, clamping at the epoch.
    #[must_use]
    pub const fn offset_by(self, secs: i64) -> Self {
        if secs >= 0 {
            Self(self.0.saturating_add(secs.unsigned_abs()))
        } else {
            Self(self.0.saturating_sub(secs.unsigned_abs()))
        }
    }

    /// Signed difference `self - other` in seconds, saturating at the `i64` range.
    #[must_use]
    pub fn delta_from(self, other: Self) -> i64 {
        let delta = i128::from(self.0) - i128::from(other.0);
        i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
    }
}

/// Wrapping millisecond counter sampled from the monotonic tick source.
///
/// The counter rolls over every ~49.7 days. Elapsed-time queries use unsigned
/// wrapping subtraction, which stays exact across one rollover as long as the
/// two samples are less than a full counter period apart.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Millis(u32);

impl Millis {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Milliseconds from `earlier` to `self` using modular arithmetic.
    #[must_use]
    pub const fn wrapping_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Like [`Millis::wrapping_since`], but reports zero when `earlier`
    /// appears to be ahead of `self` (difference beyond half the counter
    /// range), which happens when an interrupt stamps an event after the
    /// tick sampled `now`.
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> u32 {
        let elapsed = self.wrapping_since(earlier);
        if elapsed > i32::MAX.unsigned_abs() {
            0
        } else {
            elapsed
        }
    }

    #[must_use]
    pub const fn wrapping_add(self, millis: u32) -> Self {
        Self(self.0.wrapping_add(millis))
    }
}

/// Converts a configuration duration into counter milliseconds, saturating.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Confidence in the currently adopted time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimeStatus {
    /// No radio fix has ever been adopted.
    NotSet,
    /// A radio fix arrived within the sync interval.
    Synced,
    /// A radio fix was adopted once, but none arrived recently.
    StaleButValid,
}

impl fmt::Display for TimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeStatus::NotSet => f.write_str("not-set"),
            TimeStatus::Synced => f.write_str("synced"),
            TimeStatus::StaleButValid => f.write_str("stale"),
        }
    }
}

/// Day of the week, Sunday first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Zero-based index with Sunday = 0.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Weekday::Sunday => 0,
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
        }
    }

    /// Builds a weekday from its index, wrapping modulo 7.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index % 7 {
            0 => Weekday::Sunday,
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            _ => Weekday::Saturday,
        }
    }

    /// Weekday of the calendar day containing `time`.
    #[must_use]
    pub fn of(time: Timestamp) -> Self {
        // 1970-01-01 was a Thursday.
        let days = time.as_secs() / SECONDS_PER_DAY;
        Self::from_index(u8::try_from((days + 4) % 7).unwrap_or(0))
    }
}

/// Broken-down calendar time in the proleptic Gregorian calendar.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    #[must_use]
    pub const fn new(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Breaks a timestamp into its calendar fields.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn from_timestamp(time: Timestamp) -> Self {
        let secs = time.as_secs();
        let days = (secs / SECONDS_PER_DAY) as i64;
        let rem = secs % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(days);

        Self {
            year: year as i32,
            month,
            day,
            hour: (rem / SECONDS_PER_HOUR) as u8,
            minute: ((rem % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u8,
            second: (rem % SECONDS_PER_MINUTE) as u8,
        }
    }

    /// Converts the calendar fields back into a timestamp.
    ///
    /// Instants before the epoch clamp to [`Timestamp::UNSET`].
    #[must_use]
    pub fn to_timestamp(&self) -> Timestamp {
        let days = days_from_civil(i64::from(self.year), self.month, self.day);
        let secs = days * 86_400
            + i64::from(self.hour) * 3_600
            + i64::from(self.minute) * 60
            + i64::from(self.second);
        u64::try_from(secs).map_or(Timestamp::UNSET, Timestamp::from_secs)
    }

    #[must_use]
    pub fn weekday(&self) -> Weekday {
        Weekday::of(self.to_timestamp())
    }
}

fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let month = i64::from(month);
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + i64::from(day) - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let shifted = days + 719_468;
    let era = if shifted >= 0 { shifted } else { shifted - 146_096 } / 146_097;
    let day_of_era = shifted - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month as u8, day as u8)
}

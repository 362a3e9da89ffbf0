//! Rule-based UTC to local time conversion.
//!
//! A [`Timezone`] is a pair of [`TransitionRule`]s: one describing when
//! daylight-saving time begins and its offset, the other when standard time
//! resumes. Rules are expressed in local wall time ("last Sunday of March at
//! 02:00"), so converting to UTC subtracts the offset in force just before the
//! transition.

use crate::peripherals::TimezoneConverter;
use crate::time::{CivilDateTime, Timestamp, Weekday};

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

/// Which occurrence of a weekday within the month.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Week {
    Last,
    First,
    Second,
    Third,
    Fourth,
}

/// A yearly offset change anchored in local time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionRule {
    pub abbrev: &'static str,
    pub week: Week,
    pub weekday: Weekday,
    /// Month, `1..=12`.
    pub month: u8,
    /// Local hour of the change.
    pub hour: u8,
    /// Offset from UTC once the rule is in force.
    pub offset_minutes: i16,
}

impl TransitionRule {
    #[must_use]
    pub const fn new(
        abbrev: &'static str,
        week: Week,
        weekday: Weekday,
        month: u8,
        hour: u8,
        offset_minutes: i16,
    ) -> Self {
        Self {
            abbrev,
            week,
            weekday,
            month,
            hour,
            offset_minutes,
        }
    }

    /// Local wall time at which the rule takes effect in `year`.
    #[must_use]
    pub fn local_instant(&self, year: i32) -> Timestamp {
        let (mut year, mut month) = (year, self.month);
        let occurrence: u64 = match self.week {
            // Find the first such weekday of the following month, then step back a week.
            Week::Last => {
                month += 1;
                if month > 12 {
                    month = 1;
                    year += 1;
                }
                1
            }
            Week::First => 1,
            Week::Second => 2,
            Week::Third => 3,
            Week::Fourth => 4,
        };

        let first_of_month = CivilDateTime::new(year, month, 1, self.hour, 0, 0).to_timestamp();
        let first_weekday = Weekday::of(first_of_month).index();
        let days_ahead = u64::from((self.weekday.index() + 7 - first_weekday) % 7);
        let instant = first_of_month
            .saturating_add_secs(days_ahead * SECONDS_PER_DAY + (occurrence - 1) * SECONDS_PER_WEEK);

        if self.week == Week::Last {
            Timestamp::from_secs(instant.as_secs().saturating_sub(SECONDS_PER_WEEK))
        } else {
            instant
        }
    }
}

/// Daylight-saving aware timezone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timezone {
    dst: TransitionRule,
    std: TransitionRule,
}

impl Timezone {
    #[must_use]
    pub const fn new(dst: TransitionRule, std: TransitionRule) -> Self {
        Self { dst, std }
    }

    /// Central European Time with summer time (CET/CEST).
    #[must_use]
    pub const fn central_european() -> Self {
        Self::new(
            TransitionRule::new("CEST", Week::Last, Weekday::Sunday, 3, 2, 120),
            TransitionRule::new("CET", Week::Last, Weekday::Sunday, 10, 3, 60),
        )
    }

    /// Whether daylight-saving time is in force at `utc`.
    #[must_use]
    pub fn is_dst(&self, utc: Timestamp) -> bool {
        if self.dst.offset_minutes == self.std.offset_minutes {
            return false;
        }

        let year = CivilDateTime::from_timestamp(utc).year;
        let dst_starts = self
            .dst
            .local_instant(year)
            .offset_by(-minutes_to_secs(self.std.offset_minutes));
        let std_starts = self
            .std
            .local_instant(year)
            .offset_by(-minutes_to_secs(self.dst.offset_minutes));

        if dst_starts < std_starts {
            utc >= dst_starts && utc < std_starts
        } else {
            // Southern hemisphere: summer time spans the new year.
            !(utc >= std_starts && utc < dst_starts)
        }
    }

    /// Rule in force at `utc`.
    #[must_use]
    pub fn rule_at(&self, utc: Timestamp) -> &TransitionRule {
        if self.is_dst(utc) { &self.dst } else { &self.std }
    }
}

impl TimezoneConverter for Timezone {
    fn to_local(&self, utc: Timestamp) -> Timestamp {
        utc.offset_by(minutes_to_secs(self.rule_at(utc).offset_minutes))
    }
}

/// Constant offset from UTC.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FixedOffset {
    offset_minutes: i16,
}

impl FixedOffset {
    pub const UTC: Self = Self::new(0);

    #[must_use]
    pub const fn new(offset_minutes: i16) -> Self {
        Self { offset_minutes }
    }
}

impl TimezoneConverter for FixedOffset {
    fn to_local(&self, utc: Timestamp) -> Timestamp {
        utc.offset_by(minutes_to_secs(self.offset_minutes))
    }
}

fn minutes_to_secs(minutes: i16) -> i64 {
    i64::from(minutes) * 60
}

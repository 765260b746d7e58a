//! Calendar model: horizon expansion and day classification.
//!
//! A [`Horizon`] is the ordered, closed interval of days a request plans
//! over. Weekdays are numbered 0-Monday … 6-Sunday; a weekend day has
//! weekday ≥ 5; weeks are keyed by ISO-8601 `(iso_year, iso_week)` and, for
//! cycle grouping, by their Monday.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{ScheduleError, ScheduleResult};

/// Ordered sequence of consecutive days covered by one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horizon {
    days: Vec<NaiveDate>,
}

impl Horizon {
    /// Expands `[start, end]` into its ordered day sequence.
    ///
    /// Fails with [`ScheduleError::InvalidHorizon`] when `end < start`.
    pub fn expand(start: NaiveDate, end: NaiveDate) -> ScheduleResult<Self> {
        if end < start {
            return Err(ScheduleError::InvalidHorizon);
        }
        let mut days = Vec::with_capacity((end - start).num_days() as usize + 1);
        let mut cur = start;
        while cur <= end {
            days.push(cur);
            cur += Duration::days(1);
        }
        Ok(Self { days })
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Day index of `date` inside the horizon, if covered.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.days.binary_search(&date).ok()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.index_of(date).is_some()
    }
}

/// Weekday as 0-Monday … 6-Sunday.
#[inline]
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Saturday or Sunday.
#[inline]
pub fn is_weekend(date: NaiveDate) -> bool {
    weekday_index(date) >= 5
}

/// ISO-8601 week key `(iso_year, iso_week)`.
#[inline]
pub fn iso_week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Monday of the week containing `date`, used as the cycle-week key.
#[inline]
pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(weekday_index(date) as i64)
}

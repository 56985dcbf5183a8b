//! Quarterly delivery dates and delivery-week membership.
//!
//! Delivery falls on the third Friday of March, June, September and December.
//! The delivery week is Monday through Friday of that week.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Months carrying a quarterly contract delivery.
pub const QUARTERLY_MONTHS: [u32; 4] = [3, 6, 9, 12];

/// Default schedule range used when the caller has no better bound.
pub const DEFAULT_YEAR_START: i32 = 2015;
pub const DEFAULT_YEAR_END: i32 = 2030;

/// Third Friday of `month` in `year`. `None` for an invalid month.
///
/// First Friday: a 1st falling Mon-Fri advances to that week's Friday
/// (`4 - weekday` days); a Saturday or Sunday 1st advances to the following
/// week's Friday (`11 - weekday` days). Two weeks later is the third Friday.
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let weekday = i64::from(first_day.weekday().num_days_from_monday());
    let to_first_friday = if weekday <= 4 { 4 - weekday } else { 11 - weekday };
    Some(first_day + Duration::days(to_first_friday + 14))
}

/// Delivery dates for every quarterly month of every year in the inclusive
/// range, in ascending order. Empty when `year_start > year_end`.
pub fn quarterly_delivery_dates(year_start: i32, year_end: i32) -> Vec<NaiveDate> {
    (year_start..=year_end)
        .flat_map(|year| QUARTERLY_MONTHS.iter().map(move |&m| (year, m)))
        .filter_map(|(year, month)| third_friday(year, month))
        .collect()
}

/// Monday through Friday of each delivery date's week.
pub fn delivery_week_dates(delivery_dates: &[NaiveDate]) -> BTreeSet<NaiveDate> {
    delivery_dates
        .iter()
        .flat_map(|&friday| {
            let monday = friday - Duration::days(4);
            (0..5).map(move |i| monday + Duration::days(i))
        })
        .collect()
}

/// Immutable delivery calendar for a year range, queried by date membership.
///
/// A delivery Friday that happens to be an exchange holiday is still a member;
/// lookups against the bar series simply never hit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySchedule {
    year_start: i32,
    year_end: i32,
    delivery_dates: Vec<NaiveDate>,
    week_dates: BTreeSet<NaiveDate>,
}

impl DeliverySchedule {
    pub fn new(year_start: i32, year_end: i32) -> Self {
        let delivery_dates = quarterly_delivery_dates(year_start, year_end);
        let week_dates = delivery_week_dates(&delivery_dates);
        Self {
            year_start,
            year_end,
            delivery_dates,
            week_dates,
        }
    }

    /// Schedule spanning the years of `first` through `last`, plus one year of
    /// headroom so a contract rolling into next year is covered.
    pub fn covering(first: NaiveDate, last: NaiveDate) -> Self {
        Self::new(first.year(), last.year() + 1)
    }

    pub fn year_range(&self) -> (i32, i32) {
        (self.year_start, self.year_end)
    }

    pub fn delivery_dates(&self) -> &[NaiveDate] {
        &self.delivery_dates
    }

    pub fn is_delivery_week(&self, date: NaiveDate) -> bool {
        self.week_dates.contains(&date)
    }

    pub fn is_delivery_day(&self, date: NaiveDate) -> bool {
        self.delivery_dates.binary_search(&date).is_ok()
    }

    /// First delivery date on or after `date`, if inside the schedule.
    pub fn next_delivery_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.delivery_dates.partition_point(|d| *d < date);
        self.delivery_dates.get(idx).copied()
    }
}

impl Default for DeliverySchedule {
    fn default() -> Self {
        Self::new(DEFAULT_YEAR_START, DEFAULT_YEAR_END)
    }
}

//! Exchange trading-session classification for an explicit timestamp.
//!
//! The engine never reads a clock: callers pass the local exchange time.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Where a timestamp falls relative to the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Weekend,
    PreOpen,
    Morning,
    LunchBreak,
    Afternoon,
    Closed,
}

impl SessionPhase {
    pub fn is_trading_day(self) -> bool {
        self != SessionPhase::Weekend
    }

    pub fn is_trading_hours(self) -> bool {
        matches!(self, SessionPhase::Morning | SessionPhase::Afternoon)
    }

    /// Short operator-facing note on when the daily bar becomes available.
    pub fn hint(self) -> &'static str {
        match self {
            SessionPhase::Weekend => "weekend, market closed",
            SessionPhase::PreOpen => "pre-open; the daily bar updates after the close",
            SessionPhase::Morning | SessionPhase::Afternoon => {
                "in session; the daily bar updates after the close"
            }
            SessionPhase::LunchBreak => "lunch break; the daily bar updates after the close",
            SessionPhase::Closed => "closed; refresh later if today's bar is missing",
        }
    }
}

/// Two-block trading day (morning and afternoon), Monday to Friday.
///
/// Comparisons are at minute granularity and inclusive at both ends of each
/// block, so 11:30:59 still counts as the morning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingSession {
    pub morning_open: NaiveTime,
    pub morning_close: NaiveTime,
    pub afternoon_open: NaiveTime,
    pub afternoon_close: NaiveTime,
}

impl Default for TradingSession {
    fn default() -> Self {
        Self {
            morning_open: hm(9, 30),
            morning_close: hm(11, 30),
            afternoon_open: hm(13, 0),
            afternoon_close: hm(15, 0),
        }
    }
}

impl TradingSession {
    pub fn phase(&self, at: NaiveDateTime) -> SessionPhase {
        if is_weekend(at.date()) {
            return SessionPhase::Weekend;
        }
        let now = minute_of_day(at.time());
        let (m_open, m_close) = (
            minute_of_day(self.morning_open),
            minute_of_day(self.morning_close),
        );
        let (a_open, a_close) = (
            minute_of_day(self.afternoon_open),
            minute_of_day(self.afternoon_close),
        );

        if now < m_open {
            SessionPhase::PreOpen
        } else if now <= m_close {
            SessionPhase::Morning
        } else if now < a_open {
            SessionPhase::LunchBreak
        } else if now <= a_close {
            SessionPhase::Afternoon
        } else {
            SessionPhase::Closed
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The latest Monday-to-Friday date on or before `date`.
///
/// Exchange holidays are not modelled; a holiday maps to itself and the
/// evaluation falls back to the last bar on or before it.
pub fn session_day_on_or_before(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

//! Calendar types: month-day anchors, seasonal windows and closed date ranges

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A day of the year written as `MM-DD`, independent of any year.
///
/// `02-29` is accepted and resolves to February 28 in common years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Result<Self> {
        let max_day = match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => 29,
            _ => return Err(Error::InvalidMonthDay(format!("{:02}-{:02}", month, day))),
        };
        if day == 0 || day > max_day {
            return Err(Error::InvalidMonthDay(format!("{:02}-{:02}", month, day)));
        }
        Ok(Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// The calendar date of this anchor in `year`
    pub fn in_year(&self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, self.day - 1))
            .unwrap_or(NaiveDate::MIN)
    }

    /// January 1
    pub fn year_start() -> Self {
        Self { month: 1, day: 1 }
    }

    /// December 31
    pub fn year_end() -> Self {
        Self { month: 12, day: 31 }
    }
}

impl FromStr for MonthDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMonthDay(s.to_string());
        let (m, d) = s.trim().split_once('-').ok_or_else(invalid)?;
        if m.len() != 2 || d.len() != 2 {
            return Err(invalid());
        }
        let month = m.parse::<u32>().map_err(|_| invalid())?;
        let day = d.parse::<u32>().map_err(|_| invalid())?;
        Self::new(month, day).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthDay {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MonthDay> for String {
    fn from(md: MonthDay) -> String {
        md.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Closed range of whole days: an acquisition on `end` is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, when: &NaiveDateTime) -> bool {
        let date = when.date();
        date >= self.start && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Seasonal acquisition window, possibly wrapping across the new year.
///
/// A window wraps when its start month is after its end month; the season
/// of year `Y` then starts in `Y - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDayWindow", into = "RawDayWindow")]
pub struct DayWindow {
    start: MonthDay,
    end: MonthDay,
}

#[derive(Serialize, Deserialize)]
struct RawDayWindow {
    start: MonthDay,
    end: MonthDay,
}

impl TryFrom<RawDayWindow> for DayWindow {
    type Error = Error;

    fn try_from(raw: RawDayWindow) -> Result<Self> {
        DayWindow::new(raw.start, raw.end)
    }
}

impl From<DayWindow> for RawDayWindow {
    fn from(w: DayWindow) -> Self {
        RawDayWindow {
            start: w.start,
            end: w.end,
        }
    }
}

impl DayWindow {
    /// Validate a window. Same-month windows whose start day is after the
    /// end day select nothing and are rejected.
    pub fn new(start: MonthDay, end: MonthDay) -> Result<Self> {
        if start.month == end.month && start.day > end.day {
            return Err(Error::EmptyDayWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(start.parse()?, end.parse()?)
    }

    /// The whole calendar year
    pub fn full_year() -> Self {
        Self {
            start: MonthDay::year_start(),
            end: MonthDay::year_end(),
        }
    }

    pub fn start(&self) -> MonthDay {
        self.start
    }

    pub fn end(&self) -> MonthDay {
        self.end
    }

    pub fn wraps(&self) -> bool {
        self.start.month > self.end.month
    }

    /// Date ranges covering the season of `year`, previous-year part first
    pub fn ranges_for_year(&self, year: i32) -> Vec<DateRange> {
        if self.wraps() {
            vec![
                DateRange::new(self.start.in_year(year - 1), MonthDay::year_end().in_year(year - 1)),
                DateRange::new(MonthDay::year_start().in_year(year), self.end.in_year(year)),
            ]
        } else {
            vec![DateRange::new(self.start.in_year(year), self.end.in_year(year))]
        }
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Date stamped on every annual composite (August 1 unless configured)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NominalDate(pub MonthDay);

impl Default for NominalDate {
    fn default() -> Self {
        NominalDate(MonthDay { month: 8, day: 1 })
    }
}

impl NominalDate {
    /// Midnight of the nominal day in `year`
    pub fn timestamp(&self, year: i32) -> NaiveDateTime {
        self.0.in_year(year).and_time(NaiveTime::MIN)
    }

    /// Year of a timestamp produced by [`NominalDate::timestamp`]
    pub fn year_of(when: &NaiveDateTime) -> i32 {
        when.year()
    }
}

//! Date handling for daily datasets.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> CommonResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| CommonError::InvalidDate(s.to_string()))
}

/// Parse the compact `YYYYMMDD` form used in dataset file names.
pub fn parse_compact_date(s: &str) -> CommonResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| CommonError::InvalidDate(s.to_string()))
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse a range from two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> CommonResult<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date >= &self.start && date <= &self.end
    }

    /// True when `start` is after `end`.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Every day in the range, ascending. Empty when `start > end`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.checked_add_days(Days::new(1)))
            .take_while(move |d| *d <= end)
    }

    /// Number of days in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    /// Start date as `YYYYMMDD`.
    pub fn start_compact(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    /// End date as `YYYYMMDD`.
    pub fn end_compact(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let range = DateRange::parse("1992-09-26", "2020-12-31").unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(1992, 9, 26).unwrap());
        assert_eq!(range.start_compact(), "19920926");
        assert_eq!(range.end_compact(), "20201231");
        assert!(DateRange::parse("1992-13-01", "2020-01-01").is_err());
    }

    #[test]
    fn test_days_inclusive() {
        let range = DateRange::parse("2020-02-27", "2020-03-01").unwrap();
        let days: Vec<String> = range.days().map(|d| d.to_string()).collect();
        assert_eq!(
            days,
            vec!["2020-02-27", "2020-02-28", "2020-02-29", "2020-03-01"]
        );
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = DateRange::parse("2020-03-01", "2020-02-01").unwrap();
        assert!(range.is_empty());
        assert_eq!(range.days().count(), 0);
        assert_eq!(range.len(), 0);
    }

    #[test]
    fn test_parse_compact_date() {
        assert_eq!(
            parse_compact_date("20200101").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
        assert!(parse_compact_date("fv2.0.2.nc").is_err());
    }
}

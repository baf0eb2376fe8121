//! Monthly periods for the NDVI time series.

use crate::error::AgroError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, labelled "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, AgroError> {
        if !(1..=12).contains(&month) {
            return Err(AgroError::InvalidMonth(format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse "YYYY-MM".
    pub fn parse(s: &str) -> Result<Self, AgroError> {
        let invalid = || AgroError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following month; the exclusive end of this period.
    pub fn exclusive_end(&self) -> NaiveDate {
        self.next().first_day()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.exclusive_end().pred_opt().unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// "YYYY-MM"
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for MonthPeriod {
    type Error = AgroError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MonthPeriod> for String {
    fn from(m: MonthPeriod) -> Self {
        m.label()
    }
}

/// Every month from `start` to `end`, both included.
pub fn months_between(start: MonthPeriod, end: MonthPeriod) -> Vec<MonthPeriod> {
    let mut months = Vec::new();
    let mut current = start;
    while current <= end {
        months.push(current);
        current = current.next();
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_has_thirteen_months() {
        let start = MonthPeriod::parse("2023-06").unwrap();
        let end = MonthPeriod::parse("2024-06").unwrap();
        let months = months_between(start, end);
        assert_eq!(months.len(), 13);
        assert_eq!(months[6].label(), "2023-12");
        assert_eq!(months[7].label(), "2024-01");
    }

    #[test]
    fn test_period_bounds() {
        let feb = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(feb.exclusive_end(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let dec = MonthPeriod::new(2023, 12).unwrap();
        assert_eq!(dec.exclusive_end(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MonthPeriod::parse("2024-13").is_err());
        assert!(MonthPeriod::parse("2024").is_err());
        assert!(MonthPeriod::parse("abcd-01").is_err());
    }

    #[test]
    fn test_serde_as_label() {
        let m = MonthPeriod::new(2023, 6).unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"2023-06\"");
        let back: MonthPeriod = serde_json::from_str("\"2023-06\"").unwrap();
        assert_eq!(back, m);
    }
}

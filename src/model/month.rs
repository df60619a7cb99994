use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month written as `YYYY-MM`.
///
/// The string form is zero padded, so ordering the strings is the same as ordering the months.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> crate::error::Res<Self> {
        if !(1..=12).contains(&month) {
            bail!("Month must be between 1 and 12, got {month}");
        }
        if !(0..=9999).contains(&year) {
            bail!("Year must have four digits, got {year}");
        }
        Ok(Self { year, month })
    }

    /// The month that contains `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in local time.
    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .with_context(|| format!("Month must be in the format 'YYYY-MM', got '{s}'"))?;
        if year.len() != 4 || month.len() != 2 {
            bail!("Month must be in the format 'YYYY-MM', got '{s}'");
        }
        let year = year
            .parse::<i32>()
            .with_context(|| format!("Invalid year in month '{s}'"))?;
        let month = month
            .parse::<u32>()
            .with_context(|| format!("Invalid month in '{s}'"))?;
        Month::new(year, month)
    }
}

impl Serialize for Month {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Month::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_display_is_zero_padded() {
        assert_eq!(Month::new(2025, 3).unwrap().to_string(), "2025-03");
    }

    #[test]
    fn test_month_from_str() {
        let m: Month = "2025-01".parse().unwrap();
        assert_eq!(m.year(), 2025);
        assert_eq!(m.month(), 1);
    }

    #[test]
    fn test_month_from_str_invalid() {
        assert!("2025-1".parse::<Month>().is_err());
        assert!("2025-13".parse::<Month>().is_err());
        assert!("25-01".parse::<Month>().is_err());
        assert!("2025/01".parse::<Month>().is_err());
        assert!("".parse::<Month>().is_err());
    }

    #[test]
    fn test_month_ordering_matches_strings() {
        let a: Month = "2024-12".parse().unwrap();
        let b: Month = "2025-01".parse().unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_month_contains() {
        let m: Month = "2025-02".parse().unwrap();
        assert!(m.contains(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
        assert!(!m.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
    }

    #[test]
    fn test_month_serde() {
        let m: Month = serde_json::from_str(r#""2025-07""#).unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), r#""2025-07""#);
    }
}

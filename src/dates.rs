use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result, DATE_FORMAT};

/// Docket date as the portal's filter input expects it: `dd/mm/yyyy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportDate(NaiveDate);

impl ReportDate {
    pub fn parse(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Self)
            .map_err(|_| Error::InvalidDate(s.into()))
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl Serialize for ReportDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReportDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ReportDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Dates to query for a request made on `today`.
///
/// An explicit date wins. Otherwise the previous day is queried, except that
/// Monday covers Friday and Saturday, and Sunday covers Friday and Saturday.
pub fn target_dates(explicit: Option<&str>, today: NaiveDate) -> Result<Vec<ReportDate>> {
    if let Some(s) = explicit.filter(|s| !s.trim().is_empty()) {
        return Ok(vec![ReportDate::parse(s)?]);
    }

    let back = |days: i64| ReportDate(today - Duration::days(days));
    let dates = match today.weekday() {
        Weekday::Mon => vec![back(3), back(2)],
        Weekday::Sun => vec![back(2), back(1)],
        _ => vec![back(1)],
    };
    Ok(dates)
}

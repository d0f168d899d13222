use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A personal income tax year. Assessment runs on the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxYear(pub i32);

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TaxYear {
    pub fn new(year: i32) -> Self {
        TaxYear(year)
    }

    /// January 1 of this tax year, or `None` outside chrono's supported range.
    pub fn start_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 1, 1)
    }

    /// December 31 of this tax year (inclusive end).
    pub fn end_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 12, 31)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        match (self.start_date(), self.end_date()) {
            (Some(start), Some(end)) => date >= start && date <= end,
            _ => false,
        }
    }
}

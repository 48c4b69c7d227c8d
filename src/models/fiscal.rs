use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A 21st-to-20th accounting window. Derived from a reference date, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Display name of the competency month, e.g. "February 2026".
    pub competency: String,
}

impl FiscalPeriod {
    /// Normalized period identifier: the ISO start date. Stored as the vault
    /// account's cycle reference instead of the locale-formatted competency
    /// name, which drifts with formatting.
    pub fn cycle_key(&self) -> String {
        self.start.to_string()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One Saturday-bounded slice of a fiscal period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBlock {
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekBlock {
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

pub fn competency_label(date: NaiveDate) -> String {
    format!("{} {}", month_name(date.month()), date.year())
}

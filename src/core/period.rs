//! Reporting period calculation

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::info;

/// A half-open date range, inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostPeriod {
    #[serde(rename = "Start", with = "api_date")]
    pub start: NaiveDate,
    #[serde(rename = "End", with = "api_date")]
    pub end: NaiveDate,
}

impl CostPeriod {
    /// The calendar month that starts on `first`.
    pub fn month_starting(first: NaiveDate) -> Option<Self> {
        let end = first.checked_add_months(Months::new(1))?;
        Some(CostPeriod { start: first, end })
    }

    /// Month name and year of the period start, e.g. "January 2023".
    pub fn label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

impl Display for CostPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Calculate the target and compare periods for a run on `today`.
///
/// The job runs at the beginning of a month and reports on the previous
/// month, comparing it to the month before that.
pub fn report_periods(today: NaiveDate) -> anyhow::Result<(CostPeriod, CostPeriod)> {
    let this_month = today
        .with_day(1)
        .ok_or_else(|| anyhow::anyhow!("Invalid date: {today}"))?;
    let target_start = this_month
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| anyhow::anyhow!("Date out of range: {today}"))?;
    let compare_start = target_start
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| anyhow::anyhow!("Date out of range: {today}"))?;

    let target = CostPeriod {
        start: target_start,
        end: this_month,
    };
    let compare = CostPeriod {
        start: compare_start,
        end: target_start,
    };

    info!("Target month: {target}");
    info!("Compare month: {compare}");
    Ok((target, compare))
}

mod api_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

//! Properties and reporting periods.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TieoutError;

/// A real-estate asset under management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    /// Short human code, e.g. `MAPLE-01`.
    pub code: String,
    pub name: String,
}

/// Lightweight (year, month) key, used for maps and run locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The previous calendar month.
    pub fn prev(&self) -> PeriodKey {
        if self.month == 1 {
            PeriodKey { year: self.year - 1, month: 12 }
        } else {
            PeriodKey { year: self.year, month: self.month - 1 }
        }
    }

    /// The next calendar month.
    pub fn next(&self) -> PeriodKey {
        if self.month == 12 {
            PeriodKey { year: self.year + 1, month: 1 }
        } else {
            PeriodKey { year: self.year, month: self.month + 1 }
        }
    }

    /// Whole months from `other` to `self` (positive when `self` is later).
    pub fn months_since(&self, other: &PeriodKey) -> i32 {
        (self.year - other.year) * 12 + self.month as i32 - other.month as i32
    }

    /// `2025-07` style label.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A monthly reporting period for one property. Immutable once created;
/// ordered by (year, month).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub property_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingPeriod {
    /// Build a calendar-month period. Fails for an out-of-range month.
    pub fn new(property_id: Uuid, year: i32, month: u32) -> Result<Self, TieoutError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(TieoutError::InvalidPeriod { year, month })?;
        let next = PeriodKey::new(year, month).next();
        let end = NaiveDate::from_ymd_opt(next.year, next.month, 1)
            .ok_or(TieoutError::InvalidPeriod { year, month })?
            .pred_opt()
            .ok_or(TieoutError::InvalidPeriod { year, month })?;
        Ok(Self { property_id, year, month, start, end })
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.year, self.month)
    }

    pub fn label(&self) -> String {
        self.key().label()
    }

    /// First month of the fiscal (calendar) year this period falls in.
    pub fn fiscal_year_start(&self) -> PeriodKey {
        PeriodKey::new(self.year, 1)
    }

    /// Whether `date` falls inside this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl PartialEq for ReportingPeriod {
    fn eq(&self, other: &Self) -> bool {
        self.property_id == other.property_id && self.key() == other.key()
    }
}

impl Eq for ReportingPeriod {}

/// Number of days in a period's month (for window-span heuristics).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let key = PeriodKey::new(year, month);
    let next = key.next();
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next_first = NaiveDate::from_ymd_opt(next.year, next.month, 1);
    match (first, next_first) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_key_ordering_and_arithmetic() {
        let jan = PeriodKey::new(2025, 1);
        let dec = PeriodKey::new(2024, 12);
        assert!(dec < jan);
        assert_eq!(jan.prev(), dec);
        assert_eq!(dec.next(), jan);
        assert_eq!(jan.months_since(&dec), 1);
        assert_eq!(PeriodKey::new(2025, 7).months_since(&PeriodKey::new(2024, 7)), 12);
        assert_eq!(jan.label(), "2025-01");
    }

    #[test]
    fn reporting_period_bounds() {
        let p = ReportingPeriod::new(Uuid::new_v4(), 2025, 2).unwrap();
        assert_eq!(p.start, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(p.end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert!(p.contains(NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
    }

    #[test]
    fn invalid_month_rejected() {
        assert!(ReportingPeriod::new(Uuid::new_v4(), 2025, 13).is_err());
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
    }
}

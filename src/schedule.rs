//! Simulation schedule: a non-empty ordered sequence of dates forming
//! periods `[d_i, d_{i+1})` (spec.md §3).

use crate::date::Date;
use crate::error::DomainError;

#[derive(Debug, Clone)]
pub struct Schedule {
    dates: Vec<Date>,
}

impl Schedule {
    /// Build a schedule from an explicit, strictly increasing list of dates.
    pub fn new(dates: Vec<Date>) -> Result<Self, DomainError> {
        if dates.is_empty() {
            return Err(DomainError::InvalidValue {
                what: "Schedule",
                detail: "schedule must contain at least one date".to_string(),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DomainError::InvalidValue {
                what: "Schedule",
                detail: "dates must be strictly increasing".to_string(),
            });
        }
        Ok(Self { dates })
    }

    /// Build a schedule of evenly spaced dates, `count` periods of `months`
    /// months starting at `start` (`count + 1` dates total).
    pub fn monthly(start: Date, months_per_step: u32, count: usize) -> Result<Self, DomainError> {
        let mut dates = Vec::with_capacity(count + 1);
        let mut current = start;
        dates.push(current);
        for _ in 0..count {
            current = crate::date::months_after(current, months_per_step);
            dates.push(current);
        }
        Self::new(dates)
    }

    pub fn size(&self) -> usize {
        self.dates.len()
    }

    pub fn date(&self, i: usize) -> Date {
        self.dates[i]
    }

    pub fn contains(&self, d: Date) -> bool {
        self.dates.binary_search(&d).is_ok()
    }

    pub fn index(&self, d: Date) -> Option<usize> {
        self.dates.binary_search(&d).ok()
    }

    /// Number of periods (`size() - 1`); zero for a single-date schedule.
    pub fn num_periods(&self) -> usize {
        self.dates.len().saturating_sub(1)
    }

    /// `i` such that `d_i <= d < d_{i+1}`. `None` if `d` is before the
    /// first date or on/after the last date (the schedule has no period
    /// starting there).
    pub fn find_containing_period(&self, d: Date) -> Option<usize> {
        if d < self.dates[0] || d >= *self.dates.last().unwrap() {
            return None;
        }
        // first index with date > d, then step back one.
        let idx = self.dates.partition_point(|&x| x <= d);
        Some(idx - 1)
    }

    /// Whether every date of `other` also appears in `self`.
    pub fn contains_schedule(&self, other: &Schedule) -> bool {
        other.dates.iter().all(|d| self.contains(*d))
    }

    pub fn dates(&self) -> &[Date] {
        &self.dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> Schedule {
        Schedule::new(vec![d(2020, 1, 1), d(2020, 6, 1), d(2021, 1, 1)]).unwrap()
    }

    #[test]
    fn empty_schedule_rejected() {
        assert!(Schedule::new(vec![]).is_err());
    }

    #[test]
    fn non_increasing_rejected() {
        assert!(Schedule::new(vec![d(2021, 1, 1), d(2020, 1, 1)]).is_err());
        assert!(Schedule::new(vec![d(2020, 1, 1), d(2020, 1, 1)]).is_err());
    }

    #[test]
    fn basic_accessors() {
        let s = sample();
        assert_eq!(s.size(), 3);
        assert_eq!(s.num_periods(), 2);
        assert_eq!(s.date(1), d(2020, 6, 1));
        assert!(s.contains(d(2020, 6, 1)));
        assert!(!s.contains(d(2020, 7, 1)));
        assert_eq!(s.index(d(2020, 6, 1)), Some(1));
    }

    #[test]
    fn find_containing_period() {
        let s = sample();
        assert_eq!(s.find_containing_period(d(2020, 1, 1)), Some(0));
        assert_eq!(s.find_containing_period(d(2020, 3, 1)), Some(0));
        assert_eq!(s.find_containing_period(d(2020, 6, 1)), Some(1));
        assert_eq!(s.find_containing_period(d(2021, 1, 1)), None);
        assert_eq!(s.find_containing_period(d(2019, 1, 1)), None);
    }

    #[test]
    fn schedule_containment() {
        let wide = sample();
        let narrow = Schedule::new(vec![d(2020, 1, 1), d(2021, 1, 1)]).unwrap();
        assert!(wide.contains_schedule(&narrow));
        let disjoint = Schedule::new(vec![d(2020, 1, 1), d(2020, 7, 1)]).unwrap();
        assert!(!wide.contains_schedule(&disjoint));
    }

    #[test]
    fn monthly_builder() {
        let s = Schedule::monthly(d(2020, 1, 1), 6, 2).unwrap();
        assert_eq!(s.size(), 3);
        assert_eq!(s.date(1), d(2020, 7, 1));
        assert_eq!(s.date(2), d(2021, 1, 1));
    }
}

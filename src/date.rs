//! Calendar dates for the simulation.
//!
//! The teacher crate rolls its own packed-`u32` calendar (`SimTimestamp`)
//! over a synthetic 360-day year, built for a fantasy world generator that
//! never needs leap years or real month lengths. This engine needs actual
//! Gregorian dates (DOB/DOD validity, ISO-like I/O, "9 months before"
//! arithmetic), so we use `chrono` instead and keep only a thin set of
//! helpers the spec actually calls for.

use chrono::{Datelike, Months, NaiveDate};

pub type Date = NaiveDate;

/// Age in whole years as of `on`, per the usual "has the birthday happened
/// yet this year" rule. Panics if `on < dob` — callers should only ask for
/// the age of an actor known to exist on that date.
pub fn age_in_years(dob: Date, on: Date) -> u32 {
    assert!(on >= dob, "age_in_years: {on} precedes date of birth {dob}");
    let mut years = on.year() - dob.year();
    let had_birthday_this_year = (on.month(), on.day()) >= (dob.month(), dob.day());
    if !had_birthday_this_year {
        years -= 1;
    }
    years.max(0) as u32
}

/// `date` shifted back by `months` whole months, clamping the day-of-month
/// (e.g. June 30th minus one month lands on May 30th, not an invalid date).
/// Mirrors the original library's use of `Period(MONTHS, n)` arithmetic
/// instead of naive day subtraction.
pub fn months_before(date: Date, months: u32) -> Date {
    date.checked_sub_months(Months::new(months))
        .expect("months_before: date arithmetic overflowed")
}

pub fn months_after(date: Date, months: u32) -> Date {
    date.checked_add_months(Months::new(months))
        .expect("months_after: date arithmetic overflowed")
}

//! Bootstrapped-population perturbations (spec.md §4.I): date-of-birth
//! jitter and history-value noise, applied to a freshly cloned batch of
//! persons.

use chrono::Datelike;

use crate::actor::Person;
use crate::date::Date;
use crate::history::Value;
use crate::operator::incrementer::DeltaDistribution;
use crate::rng::MutableContext;

/// Applied in place to a freshly bootstrapped batch of persons (spec.md
/// §4.I; grounded on `DataPerturbation<AD>::apply`, which likewise takes
/// the whole batch rather than one actor at a time).
pub trait Perturbation: std::fmt::Debug {
    fn apply(&self, persons: &mut [Person], ctx: &mut MutableContext);
}

/// Which date-of-birth component `PerturbDateOfBirth` redraws (spec.md
/// §4.I "jitter DOB within month or within year"; grounded on the
/// separate `PerturbDateOfBirthMonth`/`PerturbDateOfBirthDay` subclasses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOfBirthJitter {
    /// Redraw the month uniformly within the same year.
    Month,
    /// Redraw the day uniformly within the same month.
    Day,
}

/// Grounded on `PerturbDateOfBirth`/`PerturbDateOfBirthMonth`/
/// `PerturbDateOfBirthDay`: redraws one date-of-birth component, moves
/// `conception_date` (if any) by the same offset, and optionally shifts
/// every recorded history date along with it.
#[derive(Debug)]
pub struct PerturbDateOfBirth {
    jitter: DateOfBirthJitter,
    shift_history_dates: bool,
    avoid_linked: bool,
}

impl PerturbDateOfBirth {
    /// `avoid_linked` skips persons with a known `mother_id`, mirroring
    /// `PerturbDateOfBirth::_avoid_linked` ("do not perturb birth dates
    /// of persons linked to their parents" — changing a linked child's
    /// DOB without also moving the mother's `link_child` conception
    /// date would desynchronize the two).
    pub fn new(jitter: DateOfBirthJitter, shift_history_dates: bool, avoid_linked: bool) -> Self {
        Self { jitter, shift_history_dates, avoid_linked }
    }

    fn redraw(&self, dob: Date, ctx: &mut MutableContext) -> Date {
        match self.jitter {
            DateOfBirthJitter::Month => {
                let new_month = 1 + ctx.rng.next_uniform_int(11) as u32;
                shift_month(dob, new_month)
            }
            DateOfBirthJitter::Day => {
                let last_day = days_in_month(dob.year(), dob.month());
                let new_day = 1 + ctx.rng.next_uniform_int((last_day - 1) as u64) as u32;
                Date::from_ymd_opt(dob.year(), dob.month(), new_day)
                    .expect("PerturbDateOfBirth::redraw: constructed an invalid calendar date")
            }
        }
    }
}

impl Perturbation for PerturbDateOfBirth {
    fn apply(&self, persons: &mut [Person], ctx: &mut MutableContext) {
        for person in persons.iter_mut() {
            if self.avoid_linked && person.mother_id().is_some() {
                continue;
            }
            let new_dob = self.redraw(person.date_of_birth(), ctx);
            person.perturb_date_of_birth(new_dob, self.shift_history_dates);
        }
    }
}

/// Move `date` to `new_month` within the same year, clamping the day of
/// month to the target month's length (e.g. 30 June -> 28 February)
/// instead of overflowing into the next month.
fn shift_month(date: Date, new_month: u32) -> Date {
    let last_day = days_in_month(date.year(), new_month);
    Date::from_ymd_opt(date.year(), new_month, date.day().min(last_day))
        .expect("shift_month: constructed an invalid calendar date")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = Date::from_ymd_opt(next_year, next_month, 1).expect("days_in_month: invalid month");
    let first_of_this = Date::from_ymd_opt(year, month, 1).expect("days_in_month: invalid month");
    (first_of_next - first_of_this).num_days() as u32
}

/// Additive (`Linear`, `X' = X + noise`) vs. multiplicative-in-log-space
/// (`Logarithmic`, `X' = X * exp(noise)`) history-value perturbation,
/// grounded on the separate `PerturbHistoryValuesDoubleLinear`/
/// `...Logarithmic` subclasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerturbationShape {
    Linear,
    Logarithmic,
}

/// Perturbs every entry of one double-typed history variable, clamped to
/// `[lower_bound, upper_bound]` (spec.md §4.I; grounded on
/// `PerturbHistoryValuesDouble`). Silently skips persons who have no
/// history recorded at `history_index`, mirroring
/// `PerturbHistoryValuesDouble::apply`'s `if
/// (StlUtils::contains(data.histories, _variable_name))` guard.
#[derive(Debug)]
pub struct PerturbHistoryValuesDouble {
    history_index: usize,
    lower_bound: f64,
    upper_bound: f64,
    noise: DeltaDistribution,
    shape: PerturbationShape,
}

impl PerturbHistoryValuesDouble {
    /// # Panics
    /// Panics if `lower_bound > upper_bound` (spec.md §4.I).
    pub fn new(
        history_index: usize,
        lower_bound: f64,
        upper_bound: f64,
        noise: DeltaDistribution,
        shape: PerturbationShape,
    ) -> Self {
        assert!(
            lower_bound <= upper_bound,
            "PerturbHistoryValuesDouble::new: lower bound {lower_bound} exceeds upper bound {upper_bound}"
        );
        Self { history_index, lower_bound, upper_bound, noise, shape }
    }
}

impl Perturbation for PerturbHistoryValuesDouble {
    fn apply(&self, persons: &mut [Person], ctx: &mut MutableContext) {
        for person in persons.iter_mut() {
            let Some(history) = person.history_mut(self.history_index) else {
                continue;
            };
            let values: Vec<f64> = history.entries().iter().map(|(_, v)| v.as_double()).collect();
            for (index, x) in values.into_iter().enumerate() {
                let noise = self.noise.draw(&mut ctx.rng);
                let perturbed = match self.shape {
                    PerturbationShape::Linear => x + noise,
                    PerturbationShape::Logarithmic => x * noise.exp(),
                };
                let clamped = perturbed.clamp(self.lower_bound, self.upper_bound);
                history.set_value_at(index, Value::Double(clamped));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::history::{DenseHistory, History, ValueType};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_jitter_keeps_year_and_clamps_day() {
        let mut ctx = MutableContext::new(1);
        let mut p = Person::new(1, Sex::Female, 0, d(2000, 6, 30));
        let perturbation = PerturbDateOfBirth::new(DateOfBirthJitter::Month, false, true);
        for _ in 0..20 {
            perturbation.apply(std::slice::from_mut(&mut p), &mut ctx);
            assert_eq!(p.date_of_birth().year(), 2000);
            assert!(p.date_of_birth().day() <= 28 || p.date_of_birth().month() != 2);
        }
    }

    #[test]
    fn avoid_linked_skips_persons_with_a_mother() {
        let mut ctx = MutableContext::new(1);
        let mut p = Person::new(1, Sex::Female, 0, d(2000, 6, 15));
        p.set_mother_id(7);
        let before = p.date_of_birth();
        let perturbation = PerturbDateOfBirth::new(DateOfBirthJitter::Day, false, true);
        perturbation.apply(std::slice::from_mut(&mut p), &mut ctx);
        assert_eq!(p.date_of_birth(), before);
    }

    #[test]
    fn shifting_histories_moves_their_dates_by_the_same_offset() {
        let mut ctx = MutableContext::new(1);
        let mut p = Person::new(1, Sex::Female, 0, d(2000, 6, 15));
        let mut h = DenseHistory::new(ValueType::Double);
        h.append(d(2000, 6, 15), Value::Double(1.0));
        h.append(d(2010, 1, 1), Value::Double(2.0));
        p.set_history(0, Box::new(h));

        let perturbation = PerturbDateOfBirth::new(DateOfBirthJitter::Day, true, false);
        perturbation.apply(std::slice::from_mut(&mut p), &mut ctx);

        let delta = p.date_of_birth() - d(2000, 6, 15);
        let history = p.history(0).unwrap();
        assert_eq!(history.first_date(), Some(d(2000, 6, 15) + delta));
        assert_eq!(history.last_date(), Some(d(2010, 1, 1) + delta));
    }

    #[test]
    fn values_are_clamped_to_bounds() {
        let mut ctx = MutableContext::new(1);
        let mut p = Person::new(1, Sex::Female, 0, d(2000, 1, 1));
        let mut h = DenseHistory::new(ValueType::Double);
        h.append(d(2000, 1, 1), Value::Double(0.5));
        p.set_history(0, Box::new(h));

        let perturbation = PerturbHistoryValuesDouble::new(
            0,
            0.0,
            1.0,
            DeltaDistribution::Gaussian { mean: 100.0, std_dev: 0.0 },
            PerturbationShape::Linear,
        );
        perturbation.apply(std::slice::from_mut(&mut p), &mut ctx);
        assert_eq!(p.history(0).unwrap().last_as_double(d(2000, 1, 1)), Some(1.0));
    }

    #[test]
    #[should_panic(expected = "exceeds upper bound")]
    fn inverted_bounds_panic() {
        PerturbHistoryValuesDouble::new(
            0,
            1.0,
            0.0,
            DeltaDistribution::Gaussian { mean: 0.0, std_dev: 1.0 },
            PerturbationShape::Linear,
        );
    }
}

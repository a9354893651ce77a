//! Hazard-model operator (spec.md §4.E.1): piecewise-constant hazard
//! rates plus relative-risk multipliers, sampling at most one jump per
//! period.

use std::collections::HashSet;

use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::predicate::{EvalContext, Predicate, YearOfBirth};
use crate::rng::MutableContext;

/// A piecewise-constant hazard rate (events/year), defined by
/// breakpoints each effective until the next. `rate_at` before the
/// first breakpoint is `0`.
#[derive(Debug, Clone)]
pub struct HazardCurve {
    breakpoints: Vec<(Date, f64)>,
}

impl HazardCurve {
    pub fn new(mut breakpoints: Vec<(Date, f64)>) -> Self {
        breakpoints.sort_by_key(|(d, _)| *d);
        Self { breakpoints }
    }

    pub fn rate_at(&self, d: Date) -> f64 {
        match self.breakpoints.partition_point(|(bd, _)| *bd <= d) {
            0 => 0.0,
            i => self.breakpoints[i - 1].1,
        }
    }

    /// `∫ λ dt` over `[from, to)`, in years, accounting for rate changes
    /// at breakpoints within the interval (spec.md "Hazard" glossary).
    pub fn cumulative_hazard(&self, from: Date, to: Date) -> f64 {
        if to <= from {
            return 0.0;
        }
        let mut cuts: Vec<Date> = self
            .breakpoints
            .iter()
            .map(|(d, _)| *d)
            .filter(|d| *d > from && *d < to)
            .collect();
        cuts.push(to);
        cuts.sort();
        let mut total = 0.0;
        let mut start = from;
        for cut in cuts {
            let years = (cut - start).num_days() as f64 / 365.25;
            total += self.rate_at(start) * years;
            start = cut;
        }
        total
    }
}

/// A dimensionless hazard multiplier with a validity window; outside the
/// window it contributes `1.0` (spec.md §6 supplement, grounded on the
/// original's `relative_risk.hpp`).
#[derive(Debug, Clone, Copy)]
pub struct RelativeRisk {
    valid_from: Date,
    valid_to: Date,
    multiplier: f64,
}

impl RelativeRisk {
    pub fn new(valid_from: Date, valid_to: Date, multiplier: f64) -> Self {
        Self {
            valid_from,
            valid_to,
            multiplier,
        }
    }

    pub fn multiplier(&self, date: Date) -> f64 {
        if date >= self.valid_from && date < self.valid_to {
            self.multiplier
        } else {
            1.0
        }
    }
}

fn combined_multiplier(risks: &[RelativeRisk], date: Date) -> f64 {
    risks.iter().map(|r| r.multiplier(date)).product()
}

/// Samples a single jump date in `[start, period_end)` given a draw
/// `u ~ U(0,1)`: jump probability is `1 - exp(-∫ λ·rr dt)` (spec.md
/// §4.E.1). Approximates the relative-risk-modulated curve as piecewise
/// constant between the base curve's breakpoints, inverting the
/// exponential CDF to place the jump within the interval where the
/// cumulative hazard first crosses `-ln(1-u)`.
pub fn sample_jump_date(curve: &HazardCurve, risks: &[RelativeRisk], start: Date, period_end: Date, u: f64) -> Option<Date> {
    if period_end <= start {
        return None;
    }
    let target = -(1.0 - u).ln();
    let mut cuts: Vec<Date> = curve
        .breakpoints
        .iter()
        .map(|(d, _)| *d)
        .filter(|d| *d > start && *d < period_end)
        .collect();
    cuts.push(period_end);
    cuts.sort();

    let mut accumulated = 0.0;
    let mut segment_start = start;
    for cut in cuts {
        let years = (cut - segment_start).num_days() as f64 / 365.25;
        let rate = curve.rate_at(segment_start) * combined_multiplier(risks, segment_start);
        let segment_hazard = rate * years;
        if accumulated + segment_hazard >= target && rate > 0.0 {
            let remaining = target - accumulated;
            let frac_years = remaining / rate;
            let days = (frac_years * 365.25).round() as i64;
            return Some(segment_start + chrono::Duration::days(days.max(0)));
        }
        accumulated += segment_hazard;
        segment_start = cut;
    }
    None
}

/// A `(predicate, HazardCurve)` cohort pair, fanned out into one operator
/// per birth-year cohort via `build_cohort_operators` (spec.md §6
/// supplement, grounded on `operator/mortality.hpp::build_operators`).
pub struct CohortCurve {
    pub birth_year_min: i32,
    pub birth_year_max: i32,
    pub curve: HazardCurve,
    pub relative_risks: Vec<RelativeRisk>,
}

/// Builds one [`HazardOperator`] per cohort curve, AND-ing the caller's
/// base predicate with a `YearOfBirth` predicate selecting that cohort.
/// Generalizes the original's `Mortality::build_operators`, which did
/// this only for mortality; here any hazard-keyed-by-birth-year curve
/// (mortality, conception) can reuse it.
pub fn build_cohort_operators(
    name_prefix: &str,
    base_predicate: Box<dyn Predicate>,
    cohorts: Vec<CohortCurve>,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
    on_transition: std::rc::Rc<dyn Fn(&mut Person, Date)>,
) -> Vec<HazardOperator> {
    cohorts
        .into_iter()
        .map(|cohort| {
            let predicate = crate::predicate::and(vec![
                base_predicate.clone_box(),
                Box::new(YearOfBirth::new(cohort.birth_year_min, cohort.birth_year_max, true)),
            ]);
            HazardOperator {
                name: format!("{name_prefix}[{}-{}]", cohort.birth_year_min, cohort.birth_year_max),
                predicate,
                curve: cohort.curve,
                relative_risks: cohort.relative_risks,
                provides: provides.clone(),
                requires: requires.clone(),
                on_transition: on_transition.clone(),
            }
        })
        .collect()
}

/// A single-transition hazard operator: draws at most one jump per
/// active period and invokes `on_transition` at the sampled date
/// (spec.md §4.E.1). Used directly by [`super::mortality::Mortality`].
pub struct HazardOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    curve: HazardCurve,
    relative_risks: Vec<RelativeRisk>,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
    on_transition: std::rc::Rc<dyn Fn(&mut Person, Date)>,
}

impl std::fmt::Debug for HazardOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HazardOperator").field("name", &self.name).finish()
    }
}

impl HazardOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        curve: HazardCurve,
        relative_risks: Vec<RelativeRisk>,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
        on_transition: std::rc::Rc<dyn Fn(&mut Person, Date)>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            curve,
            relative_risks,
            provides,
            requires,
            on_transition,
        }
    }
}

impl Operator for HazardOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn predicate(&self) -> &dyn Predicate {
        self.predicate.as_ref()
    }

    fn provides(&self) -> &HashSet<Feature> {
        &self.provides
    }

    fn requires(&self) -> &HashSet<Feature> {
        &self.requires
    }

    fn apply(&self, actor: &mut Person, asof: Date, period_end: Date, _eval: &EvalContext, ctx: &mut MutableContext) -> NewActors {
        let u = ctx.rng.next_uniform();
        if let Some(jump_date) = sample_jump_date(&self.curve, &self.relative_risks, asof, period_end, u) {
            (self.on_transition)(actor, jump_date);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn constant_curve_cumulative_hazard_scales_linearly() {
        let curve = HazardCurve::new(vec![(d(2000, 1, 1), 0.1)]);
        let half_year = curve.cumulative_hazard(d(2020, 1, 1), d(2020, 7, 2));
        assert!((half_year - 0.05).abs() < 0.01);
    }

    #[test]
    fn relative_risk_outside_window_is_identity() {
        let rr = RelativeRisk::new(d(2010, 1, 1), d(2011, 1, 1), 3.0);
        assert_eq!(rr.multiplier(d(2020, 1, 1)), 1.0);
        assert_eq!(rr.multiplier(d(2010, 6, 1)), 3.0);
    }

    #[test]
    fn high_u_with_zero_rate_never_jumps() {
        let curve = HazardCurve::new(vec![(d(2000, 1, 1), 0.0)]);
        let jump = sample_jump_date(&curve, &[], d(2020, 1, 1), d(2021, 1, 1), 0.999);
        assert!(jump.is_none());
    }

    #[test]
    fn low_target_jumps_early_in_period() {
        let curve = HazardCurve::new(vec![(d(2000, 1, 1), 5.0)]);
        let jump = sample_jump_date(&curve, &[], d(2020, 1, 1), d(2021, 1, 1), 0.999);
        assert!(jump.is_some());
        assert!(jump.unwrap() < d(2021, 1, 1));
    }
}

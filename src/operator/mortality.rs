//! Mortality (spec.md §4.E.6): a hazard-model operator over `{alive,
//! dead}`, keyed by birth-year cohort curves.

use std::collections::HashSet;
use std::rc::Rc;

use super::hazard::{build_cohort_operators, CohortCurve, HazardOperator};
use crate::feature::Feature;
use crate::predicate::Predicate;

pub const PROVIDES_MORTALITY: &str = "MORTALITY";

/// Builds one mortality operator per cohort curve. Reaching `dead` sets
/// the actor's date of death, which — via `Person::is_alive` — removes
/// it from every subsequent alive-only selection without any separate
/// bookkeeping (spec.md §4.E.6 "removes it from future operator
/// selections").
pub fn build_operators(base_predicate: Box<dyn Predicate>, cohorts: Vec<CohortCurve>, requires: HashSet<Feature>) -> Vec<HazardOperator> {
    let mut provides = HashSet::new();
    provides.insert(PROVIDES_MORTALITY.to_string());
    build_cohort_operators(
        "mortality",
        base_predicate,
        cohorts,
        provides,
        requires,
        Rc::new(|actor, jump_date| actor.die(jump_date)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Person, Sex};
    use crate::date::Date;
    use crate::operator::hazard::HazardCurve;
    use crate::operator::{apply_to_population, Operator};
    use crate::population::Population;
    use crate::predicate::True;
    use crate::registry::VariableRegistry;
    use crate::rng::MutableContext;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn high_hazard_cohort_kills_within_period() {
        let cohorts = vec![CohortCurve {
            birth_year_min: 1900,
            birth_year_max: 2100,
            curve: HazardCurve::new(vec![(d(1900, 1, 1), 50.0)]),
            relative_risks: Vec::new(),
        }];
        let ops = build_operators(Box::new(True), cohorts, HashSet::new());
        assert_eq!(ops.len(), 1);

        let mut pop = Population::new();
        pop.insert(Person::new(1, Sex::Male, 0, d(1980, 1, 1)));
        let registry = VariableRegistry::new();
        let mut ctx = MutableContext::new(1);
        apply_to_population(&ops[0], &mut pop, d(2020, 1, 1), d(2021, 1, 1), &registry, &mut ctx);
        assert!(!pop.get(1).unwrap().is_alive(d(2021, 1, 1)));
        assert!(ops[0].provides().contains(PROVIDES_MORTALITY));
    }
}

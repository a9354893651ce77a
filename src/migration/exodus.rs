//! Exodus (spec.md §4.F): fractional removal of long-settled immigrants
//! from a predicate-selected cohort over a window.

use super::model_driven::years_between;
use super::selector::{apply_co_migration, MigrantSelector};
use super::{MigrationGenerator, MigrationResult};
use crate::actor::Person;
use crate::date::Date;
use crate::population::Population;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

/// Removes a fraction of a cohort each period, but only while the
/// current period falls within `[from, to)` (spec.md §4.F "During a
/// window `[from, to)`..."): actors selected by `predicate` whose
/// `immigration_date` precedes `asof - settled_for` (i.e. those no
/// longer "recent" arrivals) are candidates, and a share of them leave
/// this period, `fraction` prorated by how much of `[from, to)` this
/// period covers. Grounded on
/// `MigrationGeneratorReturn::migrate_persons`'s `from_`/`to_` window
/// gate and `fraction_ * period_dt / total_dt` proration, the closest
/// ground-truth analogue for a windowed migration generator.
#[derive(Debug)]
pub struct ExodusGenerator {
    name: String,
    predicate: Box<dyn Predicate>,
    settled_for_days: i64,
    fraction: f64,
    from: Date,
    to: Date,
    selector: Box<dyn MigrantSelector>,
    co_migration_age_limit: u32,
}

impl ExodusGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        settled_for_days: i64,
        fraction: f64,
        from: Date,
        to: Date,
        selector: Box<dyn MigrantSelector>,
        co_migration_age_limit: u32,
    ) -> Self {
        assert!((0.0..=1.0).contains(&fraction), "ExodusGenerator: fraction must be in [0, 1]");
        assert!(from < to, "ExodusGenerator: window dates out of order");
        Self {
            name: name.into(),
            predicate,
            settled_for_days,
            fraction,
            from,
            to,
            selector,
            co_migration_age_limit,
        }
    }
}

impl MigrationGenerator for ExodusGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, population: &Population, asof: Date, period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> MigrationResult {
        if asof < self.from || period_end > self.to {
            return MigrationResult::default();
        }

        let cutoff = asof - chrono::Duration::days(self.settled_for_days);
        let candidates: Vec<&Person> = population
            .iter()
            .filter(|p| p.is_alive(asof) && self.predicate.select_alive(p, eval))
            .filter(|p| p.immigration_date().is_some_and(|d| d < cutoff))
            .collect();
        if candidates.is_empty() {
            return MigrationResult::default();
        }

        let total_dt = years_between(self.from, self.to);
        let period_dt = years_between(asof, period_end);
        let prorated = self.fraction * period_dt / total_dt;
        let count = ((candidates.len() as f64) * prorated).round() as usize;
        let mut removed = self.selector.select(&candidates, count, ctx);
        apply_co_migration(&mut removed, population, asof, self.co_migration_age_limit);
        MigrationResult { removed_ids: removed, added: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::migration::selector::RandomWithoutReplacement;
    use crate::predicate::True;
    use crate::registry::VariableRegistry;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn removes_fraction_of_long_settled_immigrants() {
        let mut population = Population::new();
        for id in 1..=10u64 {
            let mut p = Person::new(id, Sex::Male, 0, d(1980, 1, 1));
            p.set_immigration_date(d(2000, 1, 1));
            population.insert(p);
        }
        let generator = ExodusGenerator::new(
            "exodus",
            Box::new(True),
            365 * 5,
            0.5,
            d(2020, 1, 1),
            d(2021, 1, 1),
            Box::new(RandomWithoutReplacement),
            18,
        );
        let registry = VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        let result = generator.generate(&population, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);
        assert_eq!(result.removed_ids.len(), 5);
    }

    #[test]
    fn outside_the_window_nothing_is_removed() {
        let mut population = Population::new();
        for id in 1..=10u64 {
            let mut p = Person::new(id, Sex::Male, 0, d(1980, 1, 1));
            p.set_immigration_date(d(2000, 1, 1));
            population.insert(p);
        }
        let generator = ExodusGenerator::new(
            "exodus",
            Box::new(True),
            365 * 5,
            1.0,
            d(2022, 1, 1),
            d(2023, 1, 1),
            Box::new(RandomWithoutReplacement),
            18,
        );
        let registry = VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        let result = generator.generate(&population, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);
        assert!(result.removed_ids.is_empty());
    }

    #[test]
    fn recent_arrivals_are_not_candidates() {
        let mut population = Population::new();
        let mut p = Person::new(1, Sex::Male, 0, d(1980, 1, 1));
        p.set_immigration_date(d(2019, 6, 1));
        population.insert(p);
        let generator = ExodusGenerator::new(
            "exodus",
            Box::new(True),
            365 * 5,
            1.0,
            d(2020, 1, 1),
            d(2021, 1, 1),
            Box::new(RandomWithoutReplacement),
            18,
        );
        let registry = VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        let result = generator.generate(&population, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);
        assert!(result.removed_ids.is_empty());
    }
}

//! Model-driven migration (spec.md §4.F): grows or shrinks a predicate-
//! selected cohort toward a rate-curve target, removing or bootstrapping
//! members to close the gap.

use super::selector::{apply_co_migration, MigrantSelector};
use super::{MigrationGenerator, MigrationResult};
use crate::actor::Person;
use crate::date::Date;
use crate::population::Population;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

/// Elapsed time between two dates in years (365.25-day year). Shared
/// with `exodus`/`return_flow`'s window-fraction proration, which needs
/// the same ratio-of-elapsed-time calculation.
pub(super) fn years_between(start: Date, end: Date) -> f64 {
    (end - start).num_days() as f64 / 365.25
}

/// A piecewise-constant net migration rate (signed; in persons per
/// year), in force from each listed date until the next.
#[derive(Debug, Clone)]
pub struct MigrationRateCurve {
    points: Vec<(Date, f64)>,
}

impl MigrationRateCurve {
    pub fn new(mut points: Vec<(Date, f64)>) -> Self {
        points.sort_by_key(|(d, _)| *d);
        Self { points }
    }

    fn rate_at(&self, d: Date) -> f64 {
        match self.points.partition_point(|(date, _)| *date <= d) {
            0 => 0.0,
            i => self.points[i - 1].1,
        }
    }

    /// `∫ rate dt` over `[start, end)`, in persons (spec.md §4.F "Δx is
    /// the integral of the model's rate over the period").
    pub fn integral(&self, start: Date, end: Date) -> f64 {
        let mut breakpoints: Vec<Date> = self.points.iter().map(|(d, _)| *d).filter(|d| *d > start && *d < end).collect();
        breakpoints.sort();
        let mut total = 0.0;
        let mut cursor = start;
        for bp in breakpoints {
            total += self.rate_at(cursor) * years_between(cursor, bp);
            cursor = bp;
        }
        total += self.rate_at(cursor) * years_between(cursor, end);
        total
    }
}

#[derive(Debug, Clone)]
pub struct MigrationModel {
    pub rate: MigrationRateCurve,
}

#[derive(Debug)]
pub struct ModelDrivenGenerator {
    name: String,
    predicate: Box<dyn Predicate>,
    model: MigrationModel,
    selector: Box<dyn MigrantSelector>,
    co_migration_age_limit: u32,
}

impl ModelDrivenGenerator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        model: MigrationModel,
        selector: Box<dyn MigrantSelector>,
        co_migration_age_limit: u32,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            model,
            selector,
            co_migration_age_limit,
        }
    }
}

impl MigrationGenerator for ModelDrivenGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, population: &Population, asof: Date, period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> MigrationResult {
        let selected: Vec<&Person> = population
            .iter()
            .filter(|p| p.is_alive(asof) && self.predicate.select_alive(p, eval))
            .collect();
        let x0 = selected.len();
        let delta = self.model.rate.integral(asof, period_end);
        let x1 = ctx.rng.stochastic_round((x0 as f64 + delta).max(0.0)) as usize;

        if x1 < x0 {
            let mut removed = self.selector.select(&selected, x0 - x1, ctx);
            apply_co_migration(&mut removed, population, asof, self.co_migration_age_limit);
            return MigrationResult { removed_ids: removed, added: Vec::new() };
        }

        if x1 > x0 && !selected.is_empty() {
            let to_add = x1 - x0;
            let migration_date = period_end;
            let mut added = Vec::with_capacity(to_add);
            for _ in 0..to_add {
                let template_idx = ctx.rng.next_uniform_int(selected.len() as u64 - 1) as usize;
                let mut immigrant = selected[template_idx].cloned_with_id(ctx.gen_id());
                immigrant.set_immigration_date(migration_date);
                added.push(immigrant);
            }
            return MigrationResult { removed_ids: Vec::new(), added };
        }

        MigrationResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::selector::RandomWithoutReplacement;
    use crate::actor::Sex;
    use crate::predicate::True;
    use crate::registry::VariableRegistry;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn positive_rate_adds_bootstrapped_immigrants() {
        let mut population = Population::new();
        for id in 1..=10u64 {
            population.insert(Person::new(id, Sex::Male, 2, d(1990, 1, 1)));
        }
        let model = MigrationModel {
            rate: MigrationRateCurve::new(vec![(d(2000, 1, 1), 10.0)]),
        };
        let generator = ModelDrivenGenerator::new("growth", Box::new(True), model, Box::new(RandomWithoutReplacement), 18);
        let registry = VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        let result = generator.generate(&population, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);
        assert_eq!(result.removed_ids.len(), 0);
        assert_eq!(result.added.len(), 10);
        assert!(result.added.iter().all(|p| p.immigration_date() == Some(d(2021, 1, 1))));
    }

    #[test]
    fn negative_rate_removes_members() {
        let mut population = Population::new();
        for id in 1..=10u64 {
            population.insert(Person::new(id, Sex::Male, 2, d(1990, 1, 1)));
        }
        let model = MigrationModel {
            rate: MigrationRateCurve::new(vec![(d(2000, 1, 1), -5.0)]),
        };
        let generator = ModelDrivenGenerator::new("shrink", Box::new(True), model, Box::new(RandomWithoutReplacement), 18);
        let registry = VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        let result = generator.generate(&population, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);
        assert_eq!(result.removed_ids.len(), 5);
        assert!(result.added.is_empty());
    }
}

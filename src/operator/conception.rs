//! Conception operator (spec.md §4.E.7): hazard-driven conception onset
//! per female actor, gated by childbearing-age bounds and a
//! post-pregnancy zero-fertility window, recording multiplicity.

use std::collections::HashSet;

use super::hazard::{sample_jump_date, HazardCurve, RelativeRisk};
use super::markov::sample_category;
use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::{months_after, months_before, Date};
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;
use crate::vocabulary::{PregnancyEvent, CONCEPTION, PREGNANCY_EVENT};

/// The hazard model plus the bounds/window spec.md §4.E.7 lists as
/// conception's inputs.
#[derive(Debug, Clone)]
pub struct ConceptionModel {
    pub curve: HazardCurve,
    pub relative_risks: Vec<RelativeRisk>,
    /// `multiplicity_weights[i]` is the weight of a litter of `i + 1`
    /// (singleton, twins, ...).
    pub multiplicity_weights: Vec<f64>,
    pub min_childbearing_age: u32,
    pub max_childbearing_age: u32,
    pub zero_fertility_period_months: u32,
}

fn last_terminating_event_date(actor: &Person, eval: &EvalContext) -> Option<Date> {
    let index = eval.registry.index_of(PREGNANCY_EVENT)?;
    let history = actor.history(index)?;
    history
        .entries()
        .into_iter()
        .rev()
        .find_map(|(d, v)| PregnancyEvent::from_code(v.as_int()).filter(|e| e.is_terminating()).map(|_| d))
}

/// # Panics
/// `apply` asserts a sampled conception date strictly precedes the
/// actor's DOB never happens — a conception on or before DOB is a logic
/// error per spec.md §7.
#[derive(Debug)]
pub struct ConceptionOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    model: ConceptionModel,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
    backdate_first_period: bool,
}

impl ConceptionOperator {
    /// `backdate_first_period` controls spec.md §4.E.7's "On the very
    /// first simulation date, `period_start` is back-dated by 9 months"
    /// rule (`SimulatorBuilder::backdate_first_period`, default `true`).
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        model: ConceptionModel,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
        backdate_first_period: bool,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            model,
            provides,
            requires,
            backdate_first_period,
        }
    }
}

impl Operator for ConceptionOperator {
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

    fn apply(&self, actor: &mut Person, asof: Date, period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> NewActors {
        let Some(index) = eval.registry.index_of(CONCEPTION) else {
            return Vec::new();
        };

        let min_age_floor = months_before(months_after(actor.date_of_birth(), self.model.min_childbearing_age * 12), 9);
        let mut period_start = asof.max(min_age_floor);
        if self.backdate_first_period && ctx.date_index() == 0 {
            period_start = months_before(period_start, 9);
        }
        if let Some(last_terminating) = last_terminating_event_date(actor, eval) {
            period_start = period_start.max(months_after(last_terminating, self.model.zero_fertility_period_months));
        }
        let max_age_bound = months_after(actor.date_of_birth(), self.model.max_childbearing_age * 12);
        let start = period_start;
        if start >= period_end || start >= max_age_bound {
            return Vec::new();
        }

        let u = ctx.rng.next_uniform();
        let Some(conception_date) = sample_jump_date(&self.model.curve, &self.model.relative_risks, start, period_end.min(max_age_bound), u) else {
            return Vec::new();
        };
        assert!(
            conception_date > actor.date_of_birth(),
            "ConceptionOperator::apply: conception date {conception_date} on or before DOB {}",
            actor.date_of_birth()
        );

        let multiplicity_u = ctx.rng.next_uniform();
        let multiplicity = sample_category(&self.model.multiplicity_weights, multiplicity_u) + 1;

        let person_id = actor.id();
        if let Some(history) = actor.history_mut(index) {
            if history.last_date().is_some_and(|last| last >= conception_date) {
                tracing::warn!(
                    person_id,
                    %conception_date,
                    last_date = %history.last_date().unwrap(),
                    "ConceptionOperator: a conception at or after this date is already recorded; skipping"
                );
            } else {
                history.append(conception_date, Value::Int32(multiplicity as i32));
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::history::ValueType;
    use crate::history::text::HistoryFactory;
    use crate::predicate::True;
    use crate::registry::{Dispatcher, VariableRegistry};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn high_hazard_conceives_within_period_with_singleton_default() {
        let mut registry = VariableRegistry::new();
        registry
            .register(CONCEPTION, Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Int32)))
            .unwrap();
        registry.freeze();
        let index = registry.index_of(CONCEPTION).unwrap();

        let mut mother = Person::new(1, Sex::Female, 0, d(1990, 1, 1));
        registry.install_histories(&mut mother);

        let model = ConceptionModel {
            curve: HazardCurve::new(vec![(d(1900, 1, 1), 50.0)]),
            relative_risks: Vec::new(),
            multiplicity_weights: vec![1.0, 0.0],
            min_childbearing_age: 15,
            max_childbearing_age: 45,
            zero_fertility_period_months: 9,
        };
        let op = ConceptionOperator::new("conception", Box::new(True), model, HashSet::new(), HashSet::new(), true);
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);
        ctx.advance_date_index(1);
        op.apply(&mut mother, d(2020, 1, 1), d(2021, 1, 1), &eval, &mut ctx);

        let history = mother.history(index).unwrap();
        assert!(history.last_date().is_some());
        assert_eq!(history.last_as_int(d(2021, 1, 1)), Some(1));
    }
}

//! Pregnancy operator (spec.md §4.E.9): seeds a `PREGNANCY_EVENT` cascade
//! from a just-recorded `CONCEPTION`, then steps it forward to a
//! terminating `BIRTH`/`MISCARRIAGE` event.
//!
//! `vocabulary::PregnancyEvent` has exactly three codes (no separately
//! coded intermediate stages), so the cascade here is a single stage:
//! conception resolves directly to birth or miscarriage after a
//! modeled gestation offset. A richer vocabulary with intermediate
//! stages would add more `PregnancyStage` entries and a stage index
//! derived from the count of non-terminating events since conception.

use std::collections::HashSet;

use super::markov::sample_category;
use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::{months_after, Date};
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;
use crate::vocabulary::{PregnancyEvent, CONCEPTION, PREGNANCY_EVENT};

#[derive(Debug, Clone, Copy)]
pub struct PregnancyStage {
    pub months_since_conception: u32,
    pub birth_weight: f64,
    pub miscarriage_weight: f64,
}

#[derive(Debug, Clone)]
pub struct PregnancyModel {
    pub stages: Vec<PregnancyStage>,
}

#[derive(Debug)]
pub struct PregnancyOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    model: PregnancyModel,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl PregnancyOperator {
    pub fn new(name: impl Into<String>, predicate: Box<dyn Predicate>, model: PregnancyModel, provides: HashSet<Feature>, requires: HashSet<Feature>) -> Self {
        Self {
            name: name.into(),
            predicate,
            model,
            provides,
            requires,
        }
    }

    fn most_recent_conception(&self, actor: &Person, eval: &EvalContext, not_before: Date) -> Option<Date> {
        let index = eval.registry.index_of(CONCEPTION)?;
        let history = actor.history(index)?;
        history
            .entries()
            .into_iter()
            .rev()
            .map(|(d, _)| d)
            .find(|d| *d >= not_before && *d > actor.date_of_birth())
    }
}

impl Operator for PregnancyOperator {
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
        let Some(index) = eval.registry.index_of(PREGNANCY_EVENT) else {
            return Vec::new();
        };

        let last = actor.history(index).and_then(|h| h.entries().into_iter().next_back());
        let currently_pregnant = matches!(last.and_then(|(_, v)| PregnancyEvent::from_code(v.as_int())), Some(PregnancyEvent::Conception));

        let conception_date = if currently_pregnant {
            last.map(|(d, _)| d)
        } else {
            let not_before = last.map_or(actor.date_of_birth(), |(d, _)| d);
            self.most_recent_conception(actor, eval, not_before)
        };
        let Some(conception_date) = conception_date else {
            return Vec::new();
        };

        if !currently_pregnant {
            if let Some(history) = actor.history_mut(index) {
                history.append_or_correct(conception_date, Value::Int32(PregnancyEvent::Conception.code() as i32));
            }
        }

        let Some(stage) = self.model.stages.first() else {
            return Vec::new();
        };
        let candidate_date = months_after(conception_date, stage.months_since_conception).max(asof);
        if candidate_date >= period_end {
            return Vec::new();
        }

        let weights = [stage.birth_weight, stage.miscarriage_weight];
        let choice = sample_category(&weights, ctx.rng.next_uniform());
        let event = if choice == 0 { PregnancyEvent::Birth } else { PregnancyEvent::Miscarriage };
        if let Some(history) = actor.history_mut(index) {
            history.append_or_correct(candidate_date, Value::Int32(event.code() as i32));
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

    fn registry() -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry
            .register(CONCEPTION, Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Int32)))
            .unwrap();
        registry
            .register(PREGNANCY_EVENT, Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Int32)))
            .unwrap();
        registry.freeze();
        registry
    }

    #[test]
    fn seeds_then_resolves_to_birth_when_only_birth_weighted() {
        let registry = registry();
        let conception_index = registry.index_of(CONCEPTION).unwrap();
        let event_index = registry.index_of(PREGNANCY_EVENT).unwrap();

        let mut mother = Person::new(1, Sex::Female, 0, d(1990, 1, 1));
        registry.install_histories(&mut mother);
        mother.history_mut(conception_index).unwrap().append(d(2020, 1, 1), Value::Int32(1));

        let model = PregnancyModel {
            stages: vec![PregnancyStage {
                months_since_conception: 9,
                birth_weight: 1.0,
                miscarriage_weight: 0.0,
            }],
        };
        let op = PregnancyOperator::new("pregnancy", Box::new(True), model, HashSet::new(), HashSet::new());
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);

        // First call seeds CONCEPTION into PREGNANCY_EVENT; gestation not due yet.
        op.apply(&mut mother, d(2020, 1, 1), d(2020, 6, 1), &eval, &mut ctx);
        assert_eq!(mother.history(event_index).unwrap().last_as_int(d(2020, 1, 1)), Some(PregnancyEvent::Conception.code()));

        // A later period crossing the 9-month mark resolves to BIRTH.
        let eval2 = EvalContext { asof: d(2020, 6, 1), registry: &registry };
        op.apply(&mut mother, d(2020, 6, 1), d(2021, 1, 1), &eval2, &mut ctx);
        assert_eq!(mother.history(event_index).unwrap().last_as_int(d(2020, 10, 1)), Some(PregnancyEvent::Birth.code()));
    }
}

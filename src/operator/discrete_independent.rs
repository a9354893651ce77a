//! Discrete-independent ("stitched Markov") operator (spec.md §4.E.5):
//! a category trait that transitions on its own period, independent of
//! the main schedule's period length.

use std::collections::HashSet;

use super::markov::sample_category;
use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::{months_after, Date};
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

#[derive(Debug, Clone)]
pub struct DiscreteIndependentModel {
    pub period_months: u32,
    pub initial_distribution: Vec<f64>,
    pub transition_rows: Vec<Vec<f64>>,
}

/// Transitions `variable` at most once per call, only when the actor's
/// last recorded date plus the model's own period has elapsed by
/// `asof` — unlike [`super::markov::MarkovOperator`], which steps
/// through every due transition up to `period_end` in one call.
/// Optionally records the raw percentile drawn into
/// `percentile_variable`, for a later operator to derive a continuous
/// value from (spec.md §4.E.5).
#[derive(Debug)]
pub struct DiscreteIndependentOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    variable: String,
    percentile_variable: Option<String>,
    model: DiscreteIndependentModel,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl DiscreteIndependentOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        variable: impl Into<String>,
        percentile_variable: Option<String>,
        model: DiscreteIndependentModel,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            variable: variable.into(),
            percentile_variable,
            model,
            provides,
            requires,
        }
    }

    fn record_percentile(&self, actor: &mut Person, eval: &EvalContext, asof: Date, u: f64) {
        let Some(name) = &self.percentile_variable else {
            return;
        };
        let Some(index) = eval.registry.index_of(name) else {
            return;
        };
        if let Some(history) = actor.history_mut(index) {
            history.append_or_correct(asof, Value::Double(u));
        }
    }
}

impl Operator for DiscreteIndependentOperator {
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

    fn apply(&self, actor: &mut Person, asof: Date, _period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> NewActors {
        let Some(index) = eval.registry.index_of(&self.variable) else {
            return Vec::new();
        };

        let due = match actor.history(index).and_then(|h| h.last_date()) {
            None => true,
            Some(last) => months_after(last, self.model.period_months) <= asof,
        };
        if !due {
            return Vec::new();
        }

        let is_initial = actor.history(index).map_or(true, |h| h.is_empty());
        let u = ctx.rng.next_uniform();
        let state = if is_initial {
            sample_category(&self.model.initial_distribution, u)
        } else {
            let history = actor.history(index).unwrap();
            let current = history.last_as_int(asof).unwrap() as usize;
            sample_category(&self.model.transition_rows[current], u)
        };

        if let Some(history) = actor.history_mut(index) {
            history.append_or_correct(asof, Value::Int32(state as i32));
        }
        self.record_percentile(actor, eval, asof, u);
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

    fn registry_with(name: &str, value_type: ValueType) -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry.register(name, Dispatcher::new(Box::new(True), HistoryFactory::Dense(value_type))).unwrap();
        registry
    }

    #[test]
    fn initializes_then_waits_for_its_own_period() {
        let mut registry = registry_with("CAT", ValueType::Int32);
        registry
            .register("PCT", Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)))
            .unwrap();
        registry.freeze();
        let cat_index = registry.index_of("CAT").unwrap();

        let mut person = Person::new(1, Sex::Male, 0, d(1990, 1, 1));
        registry.install_histories(&mut person);

        let model = DiscreteIndependentModel {
            period_months: 12,
            initial_distribution: vec![1.0, 0.0],
            transition_rows: vec![vec![0.0, 1.0], vec![1.0, 0.0]],
        };
        let op = DiscreteIndependentOperator::new(
            "cat",
            Box::new(True),
            "CAT",
            Some("PCT".to_string()),
            model,
            HashSet::new(),
            HashSet::new(),
        );
        let eval = EvalContext { asof: d(2020, 1, 1), registry: &registry };
        let mut ctx = MutableContext::new(1);
        op.apply(&mut person, d(2020, 1, 1), d(2020, 6, 1), &eval, &mut ctx);
        assert_eq!(person.history(cat_index).unwrap().last_as_int(d(2020, 1, 1)), Some(0));

        // Within the same 12-month period: not due yet, no change.
        let eval2 = EvalContext { asof: d(2020, 6, 1), registry: &registry };
        op.apply(&mut person, d(2020, 6, 1), d(2021, 1, 1), &eval2, &mut ctx);
        assert_eq!(person.history(cat_index).unwrap().size(), 1);

        // A year later: due, transitions deterministically to state 1.
        let eval3 = EvalContext { asof: d(2021, 1, 1), registry: &registry };
        op.apply(&mut person, d(2021, 1, 1), d(2021, 6, 1), &eval3, &mut ctx);
        assert_eq!(person.history(cat_index).unwrap().last_as_int(d(2021, 1, 1)), Some(1));
    }
}

//! Population mixer operator (spec.md §4.E.12): moves a scalar history
//! variable between contiguous range bins according to a transition
//! matrix, once per period.

use std::collections::HashSet;

use super::markov::sample_category;
use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

/// A half-open `[lower, upper)` range with the value written back when
/// an actor lands in it — bins need not be equal width.
#[derive(Debug, Clone, Copy)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub representative: f64,
}

impl Bin {
    fn contains(&self, value: f64) -> bool {
        value >= self.lower && value < self.upper
    }
}

#[derive(Debug, Clone)]
pub struct PopulationMixerModel {
    pub bins: Vec<Bin>,
    pub transition_rows: Vec<Vec<f64>>,
}

impl PopulationMixerModel {
    fn bin_of(&self, value: f64) -> Option<usize> {
        self.bins.iter().position(|b| b.contains(value)).or_else(|| {
            if value < self.bins.first()?.lower {
                Some(0)
            } else {
                Some(self.bins.len() - 1)
            }
        })
    }
}

#[derive(Debug)]
pub struct PopulationMixerOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    variable: String,
    model: PopulationMixerModel,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl PopulationMixerOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        variable: impl Into<String>,
        model: PopulationMixerModel,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            variable: variable.into(),
            model,
            provides,
            requires,
        }
    }
}

impl Operator for PopulationMixerOperator {
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
        let Some(current) = actor.history(index).and_then(|h| h.last_as_double(asof)) else {
            return Vec::new();
        };
        let Some(current_bin) = self.model.bin_of(current) else {
            return Vec::new();
        };
        let next_bin = sample_category(&self.model.transition_rows[current_bin], ctx.rng.next_uniform());
        let representative = self.model.bins[next_bin].representative;
        if let Some(history) = actor.history_mut(index) {
            history.append_or_correct(asof, Value::Double(representative));
        }
        Vec::new()
    }
}

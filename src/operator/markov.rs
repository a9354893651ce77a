//! Discrete-state Markov-chain operator (spec.md §4.E.2).

use std::collections::HashSet;

use super::hazard::RelativeRisk;
use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::{months_after, Date};
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

/// Samples a category from `probs` (need not sum to exactly 1 — callers
/// may pass unnormalized relative-risk-modulated weights) given
/// `u ~ U(0,1)`.
pub fn sample_category(probs: &[f64], u: f64) -> usize {
    let total: f64 = probs.iter().sum();
    assert!(total > 0.0, "sample_category: probabilities sum to zero");
    let target = u * total;
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p;
        if target < acc {
            return i;
        }
    }
    probs.len() - 1
}

fn modulate(base: &[f64], risks: &[Vec<RelativeRisk>], date: Date) -> Vec<f64> {
    base.iter()
        .enumerate()
        .map(|(i, p)| {
            let rr: f64 = risks.get(i).map_or(1.0, |rs| rs.iter().map(|r| r.multiplier(date)).product());
            p * rr
        })
        .collect()
}

/// A discrete-state chain: `initial_distribution` seeds an uninitialized
/// actor, `transition_rows[state]` gives the next-state distribution per
/// `step_months`.
#[derive(Debug, Clone)]
pub struct MarkovModel {
    pub step_months: u32,
    pub initial_distribution: Vec<f64>,
    pub transition_rows: Vec<Vec<f64>>,
    pub initial_risks: Vec<Vec<RelativeRisk>>,
    pub transition_risks: Vec<Vec<RelativeRisk>>,
}

#[derive(Debug)]
pub struct MarkovOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    variable: String,
    model: MarkovModel,
    initialize: bool,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl MarkovOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        variable: impl Into<String>,
        model: MarkovModel,
        initialize: bool,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            variable: variable.into(),
            model,
            initialize,
            provides,
            requires,
        }
    }
}

impl Operator for MarkovOperator {
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
        let Some(index) = eval.registry.index_of(&self.variable) else {
            return Vec::new();
        };
        let Some(history) = actor.history_mut(index) else {
            return Vec::new();
        };

        if history.is_empty() {
            if !self.initialize {
                return Vec::new();
            }
            let probs = modulate(&self.model.initial_distribution, &self.model.initial_risks, asof);
            let state = sample_category(&probs, ctx.rng.next_uniform());
            history.append(asof, Value::Int32(state as i32));
            return Vec::new();
        }

        let mut date = history.last_date().unwrap();
        let mut state = history.last_as_int(date).unwrap() as usize;
        loop {
            let next_date = months_after(date, self.model.step_months);
            if next_date > period_end {
                break;
            }
            let row = &self.model.transition_rows[state];
            let probs = modulate(row, &self.model.transition_risks, next_date);
            let next_state = sample_category(&probs, ctx.rng.next_uniform());
            history.append(next_date, Value::Int32(next_state as i32));
            date = next_date;
            state = next_state;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_category_picks_highest_weight_at_boundary() {
        assert_eq!(sample_category(&[0.0, 1.0], 0.5), 1);
        assert_eq!(sample_category(&[1.0, 0.0], 0.5), 0);
    }

    #[test]
    #[should_panic(expected = "sum to zero")]
    fn sample_category_rejects_all_zero() {
        sample_category(&[0.0, 0.0], 0.5);
    }
}

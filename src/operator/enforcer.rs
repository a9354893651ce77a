//! Enforcer operator (spec.md §4.E.3): empirical-percentile mapping of a
//! selected cohort onto a target marginal distribution, preserving rank.

use std::collections::HashSet;

use statrs::distribution::{ContinuousCDF, Normal};

use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

/// A target marginal for one schedule date. Only `Normal` is needed by
/// any operator built on top of this so far; more shapes can be added
/// alongside it without touching `EnforcerOperator`.
#[derive(Debug, Clone, Copy)]
pub struct NormalTarget {
    pub mean: f64,
    pub std_dev: f64,
}

impl NormalTarget {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// Maps a percentile in `(0, 1)` through this distribution's inverse
    /// CDF.
    pub fn inverse_cdf(&self, percentile: f64) -> f64 {
        Normal::new(self.mean, self.std_dev)
            .expect("NormalTarget: std_dev must be finite and positive")
            .inverse_cdf(percentile)
    }
}

/// Enforces `targets[i]` at `dates[i]` over the variable named
/// `variable`, for whichever actors the predicate selects (spec.md
/// §4.E.3). Bulk: every selected actor's raw sample is ranked against
/// the others before any value is written, so the write for one actor
/// never depends on another having already been written.
#[derive(Debug)]
pub struct EnforcerOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    variable: String,
    targets: Vec<(Date, NormalTarget)>,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl EnforcerOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        variable: impl Into<String>,
        mut targets: Vec<(Date, NormalTarget)>,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        targets.sort_by_key(|(d, _)| *d);
        Self {
            name: name.into(),
            predicate,
            variable: variable.into(),
            targets,
            provides,
            requires,
        }
    }

    fn target_at(&self, asof: Date) -> Option<&NormalTarget> {
        match self.targets.partition_point(|(d, _)| *d <= asof) {
            0 => None,
            i => Some(&self.targets[i - 1].1),
        }
    }
}

impl Operator for EnforcerOperator {
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

    fn apply(&self, _actor: &mut Person, _asof: Date, _period_end: Date, _eval: &EvalContext, _ctx: &mut MutableContext) -> NewActors {
        Vec::new()
    }

    fn is_bulk(&self) -> bool {
        true
    }

    fn apply_bulk(&self, actors: &mut [&mut Person], asof: Date, _period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> NewActors {
        let Some(index) = eval.registry.index_of(&self.variable) else {
            return Vec::new();
        };
        let Some(target) = self.target_at(asof) else {
            return Vec::new();
        };

        let mut raw: Vec<(usize, f64)> = Vec::with_capacity(actors.len());
        for (i, actor) in actors.iter_mut().enumerate() {
            let Some(history) = actor.history_mut(index) else {
                continue;
            };
            let sample = match history.last_date() {
                Some(d) if d <= asof => history.last_as_double(asof).unwrap(),
                _ => ctx.rng.next_uniform(),
            };
            raw.push((i, sample));
        }
        if raw.is_empty() {
            return Vec::new();
        }

        raw.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let n = raw.len() as f64;
        for (rank, (i, _)) in raw.into_iter().enumerate() {
            let percentile = (rank as f64 + 0.5) / n;
            let value = target.inverse_cdf(percentile);
            let history = actors[i].history_mut(index).unwrap();
            history.append_or_correct(asof, Value::Double(value));
        }
        Vec::new()
    }
}

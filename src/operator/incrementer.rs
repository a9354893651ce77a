//! Incrementer operator (spec.md §4.E.4): draws a delta per actor from a
//! date-indexed distribution and appends `last + delta` at the next
//! schedule date.

use std::collections::HashSet;

use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;
use crate::schedule::Schedule;

/// A per-period delta distribution. `AlphaStable` reuses
/// `SimRng::next_alpha_stable` for heavy-tailed trait drift (spec.md
/// §4.A); `Gaussian` is the common case.
#[derive(Debug, Clone, Copy)]
pub enum DeltaDistribution {
    Gaussian { mean: f64, std_dev: f64 },
    AlphaStable { alpha: f64, scale: f64, location: f64 },
}

impl DeltaDistribution {
    /// Draw one noise value. Shared with `initialiser::perturbation`,
    /// which reuses this enum as its perturbation-noise abstraction
    /// instead of defining a second one.
    pub fn draw(&self, rng: &mut crate::rng::SimRng) -> f64 {
        match *self {
            DeltaDistribution::Gaussian { mean, std_dev } => mean + std_dev * rng.next_gaussian(),
            DeltaDistribution::AlphaStable { alpha, scale, location } => location + scale * rng.next_alpha_stable(alpha),
        }
    }
}

/// Increments `variable` by a draw from `distributions[i]` at
/// `schedule.date(i + 1)`, where `i` is the period containing `asof`.
///
/// # Panics
/// `new` panics if `schedule.size() > distributions.len() + 1` (spec.md
/// §4.E.4 "requires size(schedule) ≤ size(distributions)" — stated in
/// terms of periods, one distribution per period).
#[derive(Debug)]
pub struct IncrementerOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    variable: String,
    schedule: Schedule,
    distributions: Vec<DeltaDistribution>,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl IncrementerOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        variable: impl Into<String>,
        schedule: Schedule,
        distributions: Vec<DeltaDistribution>,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        assert!(
            schedule.num_periods() <= distributions.len(),
            "IncrementerOperator::new: schedule has {} periods but only {} distributions",
            schedule.num_periods(),
            distributions.len()
        );
        Self {
            name: name.into(),
            predicate,
            variable: variable.into(),
            schedule,
            distributions,
            provides,
            requires,
        }
    }
}

impl Operator for IncrementerOperator {
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
        let Some(period) = self.schedule.find_containing_period(asof) else {
            return Vec::new();
        };
        let next_date = self.schedule.date(period + 1);
        let Some(history) = actor.history_mut(index) else {
            return Vec::new();
        };
        let last = history.last_as_double(asof).unwrap_or(0.0);
        let delta = self.distributions[period].draw(&mut ctx.rng);
        history.append_or_correct(next_date, Value::Double(last + delta));
        Vec::new()
    }
}

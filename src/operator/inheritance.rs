//! Inheritance operator (spec.md §4.E.11): bivariate Gaussian-copula
//! transfer of a named continuous variable from mother to child at a
//! reference date (conception or birth).
//!
//! The mother's stored value is mapped through her marginal CDF into a
//! percentile, then into Gaussian space; the child's share of the
//! correlated pair is drawn via [`crate::rng::SimRng::next_correlated_gaussian`]
//! conditioned on that value, then mapped back through the child's
//! marginal inverse CDF.

use std::collections::HashMap;
use std::collections::HashSet;

use statrs::distribution::{ContinuousCDF, Normal};

use super::{NewActors, Operator};
use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::history::Value;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePoint {
    Conception,
    Birth,
}

impl ReferencePoint {
    fn date_of(self, child: &Person) -> Option<Date> {
        match self {
            ReferencePoint::Conception => child.conception_date(),
            ReferencePoint::Birth => Some(child.date_of_birth()),
        }
    }
}

#[derive(Debug)]
pub struct InheritanceOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    mother_variable: String,
    child_variable: String,
    reference: ReferencePoint,
    mother_marginal: Normal,
    child_marginal: Normal,
    correlation: f64,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl InheritanceOperator {
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        mother_variable: impl Into<String>,
        child_variable: impl Into<String>,
        reference: ReferencePoint,
        mother_marginal: Normal,
        child_marginal: Normal,
        correlation: f64,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
    ) -> Self {
        assert!(
            (-1.0..=1.0).contains(&correlation),
            "InheritanceOperator::new: correlation {correlation} must lie in [-1, 1]"
        );
        Self {
            name: name.into(),
            predicate,
            mother_variable: mother_variable.into(),
            child_variable: child_variable.into(),
            reference,
            mother_marginal,
            child_marginal,
            correlation,
            provides,
            requires,
        }
    }

    fn transfer(&self, mother_value: f64, ctx: &mut MutableContext) -> f64 {
        let mother_percentile = self.mother_marginal.cdf(mother_value).clamp(1e-9, 1.0 - 1e-9);
        let standard = Normal::new(0.0, 1.0).expect("standard normal always constructs");
        let mother_z = standard.inverse_cdf(mother_percentile);
        let noise_scale = (1.0 - self.correlation * self.correlation).max(0.0).sqrt();
        let noise = ctx.rng.next_correlated_gaussian(&[vec![noise_scale]])[0];
        let child_z = self.correlation * mother_z + noise;
        let child_percentile = standard.cdf(child_z).clamp(1e-9, 1.0 - 1e-9);
        self.child_marginal.inverse_cdf(child_percentile)
    }
}

impl Operator for InheritanceOperator {
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

    fn apply_bulk(&self, actors: &mut [&mut Person], asof: Date, period_end: Date, eval: &EvalContext, ctx: &mut MutableContext) -> NewActors {
        let Some(mother_index) = eval.registry.index_of(&self.mother_variable) else {
            return Vec::new();
        };
        let Some(child_index) = eval.registry.index_of(&self.child_variable) else {
            return Vec::new();
        };

        let mother_values: HashMap<u64, f64> = actors
            .iter()
            .filter_map(|actor| {
                let history = actor.history(mother_index)?;
                Some((actor.id(), history.last_as_double(asof)?))
            })
            .collect();

        for actor in actors.iter_mut() {
            let Some(mother_id) = actor.mother_id() else {
                continue;
            };
            let Some(&mother_value) = mother_values.get(&mother_id) else {
                continue;
            };
            let Some(reference_date) = self.reference.date_of(actor) else {
                continue;
            };
            if reference_date < asof || reference_date >= period_end {
                continue;
            }
            if actor.history(child_index).is_some_and(|h| !h.is_empty()) {
                continue;
            }
            let child_value = self.transfer(mother_value, ctx);
            if let Some(history) = actor.history_mut(child_index) {
                history.append(reference_date, Value::Double(child_value));
            }
        }
        Vec::new()
    }
}

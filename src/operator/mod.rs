//! Stochastic life-event and trait-dynamics operators (spec.md §4.E).

pub mod birth;
pub mod conception;
pub mod discrete_independent;
pub mod enforcer;
pub mod fetus_generation;
pub mod hazard;
pub mod incrementer;
pub mod inheritance;
pub mod markov;
pub mod mortality;
pub mod population_mixer;
pub mod pregnancy;

use std::collections::HashSet;

use crate::actor::Person;
use crate::date::Date;
use crate::feature::Feature;
use crate::predicate::{EvalContext, Predicate};
use crate::registry::VariableRegistry;
use crate::rng::MutableContext;

/// A single period's worth of newly materialized actors, or none.
pub type NewActors = Vec<Person>;

/// Shared contract for all life-event / trait operators (spec.md §4.E):
/// a predicate selecting who's in scope, an activity window, and the
/// provides/requires feature tags the scheduler orders by.
pub trait Operator: std::fmt::Debug {
    fn name(&self) -> &str;

    fn predicate(&self) -> &dyn Predicate;

    /// Delegates to the predicate's `active` by default; operators with
    /// a private sub-schedule narrow it further.
    fn is_active(&self, date: Date) -> bool {
        self.predicate().active(date)
    }

    fn provides(&self) -> &HashSet<Feature>;

    fn requires(&self) -> &HashSet<Feature>;

    /// Apply this operator to one selected actor for the period
    /// `[asof, period_end)`. Returns any newly materialized actors
    /// (births); most operators return none. `ctx` carries the RNG, ID
    /// allocator, and newborn/migration buffers (spec.md §3 "Mutable
    /// context") — operators that create Persons (birth) allocate IDs
    /// and stage them through it rather than returning them bare.
    ///
    /// Operators whose semantics depend on the whole selected cohort at
    /// once (e.g. empirical-percentile enforcement) set
    /// [`Operator::is_bulk`] and override [`Operator::apply_bulk`]
    /// instead; their `apply` is never called and may be left as a
    /// no-op.
    fn apply(
        &self,
        actor: &mut Person,
        asof: Date,
        period_end: Date,
        eval: &EvalContext,
        ctx: &mut MutableContext,
    ) -> NewActors;

    /// Whether this operator must see every selected actor together
    /// (spec.md §4.E.3 "enforcer ... operates on the whole selected
    /// cohort, not actor by actor").
    fn is_bulk(&self) -> bool {
        false
    }

    /// Bulk form, used only when `is_bulk()` is true. Default forwards
    /// to per-actor `apply`, so ordinary operators never need to
    /// override this.
    fn apply_bulk(
        &self,
        actors: &mut [&mut Person],
        asof: Date,
        period_end: Date,
        eval: &EvalContext,
        ctx: &mut MutableContext,
    ) -> NewActors {
        let mut newborns = Vec::new();
        for actor in actors.iter_mut() {
            newborns.extend(self.apply(actor, asof, period_end, eval, ctx));
        }
        newborns
    }
}

/// Applies `op` to every actor in `population` selected by its
/// predicate, honoring `selects_alive_only` to skip dead actors without
/// evaluating the full predicate (spec.md §4.H step 2).
pub fn apply_to_population(
    op: &dyn Operator,
    population: &mut crate::population::Population,
    asof: Date,
    period_end: Date,
    registry: &VariableRegistry,
    ctx: &mut MutableContext,
) -> NewActors {
    let eval = EvalContext { asof, registry };
    let alive_only = op.predicate().selects_alive_only();

    if op.is_bulk() {
        let mut selected: Vec<&mut Person> = population
            .iter_mut()
            .filter(|actor| {
                if alive_only && !actor.is_alive(asof) {
                    return false;
                }
                if alive_only {
                    op.predicate().select_alive(actor, &eval)
                } else {
                    op.predicate().select(actor, &eval)
                }
            })
            .collect();
        if selected.is_empty() {
            tracing::warn!(operator = op.name(), %asof, "apply_to_population: operator selected zero actors this period");
        }
        return op.apply_bulk(&mut selected, asof, period_end, &eval, ctx);
    }

    let mut newborns = Vec::new();
    let mut selected_any = false;
    for actor in population.iter_mut() {
        if alive_only && !actor.is_alive(asof) {
            continue;
        }
        let selected = if alive_only {
            op.predicate().select_alive(actor, &eval)
        } else {
            op.predicate().select(actor, &eval)
        };
        if selected {
            selected_any = true;
            newborns.extend(op.apply(actor, asof, period_end, &eval, ctx));
        }
    }
    if !selected_any {
        tracing::warn!(operator = op.name(), %asof, "apply_to_population: operator selected zero actors this period");
    }
    newborns
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::predicate::True;

    /// A minimal `Operator` used only to exercise the scheduler
    /// (`feature.rs` tests) without any real life-event logic.
    #[derive(Debug)]
    pub struct StubOperator {
        name: String,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
        predicate: Box<dyn Predicate>,
    }

    impl StubOperator {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                provides: HashSet::new(),
                requires: HashSet::new(),
                predicate: Box::new(True),
            }
        }

        pub fn provides<const N: usize>(mut self, features: [&str; N]) -> Self {
            self.provides.extend(features.iter().map(|s| s.to_string()));
            self
        }

        pub fn requires<const N: usize>(mut self, features: [&str; N]) -> Self {
            self.requires.extend(features.iter().map(|s| s.to_string()));
            self
        }
    }

    impl Operator for StubOperator {
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
    }
}

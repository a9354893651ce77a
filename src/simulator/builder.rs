//! `SimulatorBuilder` (spec.md §4.H): accumulates operators, migration
//! generators, observers, and the variable registry, then freezes them
//! into a runnable [`super::Simulator`]. Consuming-`self` method
//! chaining follows the builder idiom used elsewhere in the pack (e.g.
//! `ProverBuilder` in the tinyzkp example) rather than the teacher's
//! plain-struct `SimConfig`, which this crate keeps only for the
//! non-accumulated run settings (see [`super::config::SimConfig`]).

use std::collections::HashSet;

use super::config::SimConfig;
use super::Simulator;
use crate::error::{DomainError, Error};
use crate::feature::{self, Feature};
use crate::migration::{MigrationGenerator, ReturnFlowGenerator};
use crate::observer::Observer;
use crate::operator::Operator;
use crate::population::Population;
use crate::registry::{Dispatcher, VariableRegistry};
use crate::rng::{EthnicityClassification, ImmutableContext, MutableContext};
use crate::schedule::Schedule;

#[derive(Default)]
pub struct SimulatorBuilder {
    schedule: Option<Schedule>,
    ethnicity: Option<EthnicityClassification>,
    registry: VariableRegistry,
    operators: Vec<Box<dyn Operator>>,
    migration_generators: Vec<Box<dyn MigrationGenerator>>,
    return_flow: Option<ReturnFlowGenerator>,
    observers: Vec<Box<dyn Observer>>,
    externally_required: HashSet<Feature>,
    ignore: HashSet<Feature>,
    config: SimConfig,
    main_population: Population,
}

impl SimulatorBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            config: SimConfig::new(seed),
            ..Self::default()
        }
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn ethnicity(mut self, ethnicity: EthnicityClassification) -> Self {
        self.ethnicity = Some(ethnicity);
        self
    }

    pub fn backdate_first_period(mut self, enabled: bool) -> Self {
        self.config.backdate_first_period = enabled;
        self
    }

    pub fn newborns_enabled(mut self, enabled: bool) -> Self {
        self.config.newborns_enabled = enabled;
        self
    }

    pub fn main_population(mut self, population: Population) -> Self {
        self.main_population = population;
        self
    }

    /// # Errors
    /// Forwards [`VariableRegistry::register`]'s errors (empty/duplicate
    /// name).
    pub fn register_variable(mut self, name: &str, dispatcher: Dispatcher) -> Result<Self, DomainError> {
        self.registry.register(name, dispatcher)?;
        Ok(self)
    }

    pub fn operator(mut self, op: Box<dyn Operator>) -> Self {
        self.operators.push(op);
        self
    }

    pub fn migration_generator(mut self, generator: Box<dyn MigrationGenerator>) -> Self {
        self.migration_generators.push(generator);
        self
    }

    pub fn return_flow(mut self, generator: ReturnFlowGenerator) -> Self {
        self.return_flow = Some(generator);
        self
    }

    pub fn observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Features supplied from outside the operator graph (e.g. seeded by
    /// an initialiser), satisfying `requires()` without any operator
    /// `provides()`-ing them (spec.md §4.D.2).
    pub fn externally_required(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.externally_required.extend(features);
        self
    }

    /// Features permanently satisfied by an earlier period, exempt from
    /// the per-period/per-actor consistency checks (spec.md §4.D
    /// preamble).
    pub fn ignore(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.ignore.extend(features);
        self
    }

    /// # Errors
    /// `DomainError::InvalidValue` if no schedule or ethnicity
    /// classification was supplied.
    ///
    /// # Panics
    /// Panics if the operator provides/requires graph has a cycle
    /// (`feature::topological_order`) — a builder-construction bug, not
    /// a recoverable condition (spec.md §7).
    pub fn build(mut self) -> Result<Simulator, Error> {
        let schedule = self.schedule.ok_or_else(|| DomainError::InvalidValue {
            what: "SimulatorBuilder",
            detail: "a schedule is required".to_string(),
        })?;
        let ethnicity = self.ethnicity.ok_or_else(|| DomainError::InvalidValue {
            what: "SimulatorBuilder",
            detail: "an ethnicity classification is required".to_string(),
        })?;

        self.registry.freeze();
        let operator_order = feature::topological_order(&self.operators);

        let immutable = ImmutableContext::new(schedule, self.registry, ethnicity);
        let mutable = MutableContext::new(self.config.seed);

        Ok(Simulator::new(
            immutable,
            mutable,
            self.config,
            self.operators,
            operator_order,
            self.migration_generators,
            self.return_flow,
            self.observers,
            self.externally_required,
            self.ignore,
            self.main_population,
        ))
    }
}

impl std::fmt::Debug for SimulatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorBuilder")
            .field("operators", &self.operators.len())
            .field("migration_generators", &self.migration_generators.len())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> crate::date::Date {
        crate::date::Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn build_requires_schedule_and_ethnicity() {
        let err = SimulatorBuilder::new(1).build();
        assert!(err.is_err());
    }

    #[test]
    fn build_succeeds_with_minimum_inputs() {
        let schedule = Schedule::monthly(d(2020, 1, 1), 12, 5).unwrap();
        let sim = SimulatorBuilder::new(1)
            .schedule(schedule)
            .ethnicity(EthnicityClassification::new("default", vec!["A".to_string()]))
            .build();
        assert!(sim.is_ok());
    }
}

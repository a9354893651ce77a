//! The simulator loop (spec.md §4.H): per-period operator application,
//! newborn integration, observer invocation, and migration, over a
//! `Schedule` of dates.

pub mod builder;
pub mod config;

pub use builder::SimulatorBuilder;
pub use config::SimConfig;

use std::collections::HashSet;

use crate::actor::Person;
use crate::date::Date;
use crate::feature::{self, Feature};
use crate::migration::{MigrationGenerator, ReturnFlowGenerator};
use crate::observer::Observer;
use crate::operator::{self, Operator};
use crate::population::Population;
use crate::predicate::EvalContext;
use crate::rng::{ImmutableContext, MutableContext};

pub struct Simulator {
    immutable: ImmutableContext,
    mutable: MutableContext,
    config: SimConfig,
    operators: Vec<Box<dyn Operator>>,
    operator_order: Vec<usize>,
    migration_generators: Vec<Box<dyn MigrationGenerator>>,
    return_flow: Option<ReturnFlowGenerator>,
    observers: Vec<Box<dyn Observer>>,
    externally_required: HashSet<Feature>,
    ignore: HashSet<Feature>,
    main: Population,
    emigrants: Population,
    checkpoints: Vec<serde_json::Value>,
}

impl Simulator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        immutable: ImmutableContext,
        mutable: MutableContext,
        config: SimConfig,
        operators: Vec<Box<dyn Operator>>,
        operator_order: Vec<usize>,
        migration_generators: Vec<Box<dyn MigrationGenerator>>,
        return_flow: Option<ReturnFlowGenerator>,
        observers: Vec<Box<dyn Observer>>,
        externally_required: HashSet<Feature>,
        ignore: HashSet<Feature>,
        main: Population,
    ) -> Self {
        Self {
            immutable,
            mutable,
            config,
            operators,
            operator_order,
            migration_generators,
            return_flow,
            observers,
            externally_required,
            ignore,
            main,
            emigrants: Population::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn immutable_context(&self) -> &ImmutableContext {
        &self.immutable
    }

    pub fn mutable_context(&self) -> &MutableContext {
        &self.mutable
    }

    pub fn mutable_context_mut(&mut self) -> &mut MutableContext {
        &mut self.mutable
    }

    pub fn main_population(&self) -> &Population {
        &self.main
    }

    pub fn main_population_mut(&mut self) -> &mut Population {
        &mut self.main
    }

    pub fn emigrant_population(&self) -> &Population {
        &self.emigrants
    }

    /// One JSON object per intermediate period, in schedule order,
    /// produced by `Observer::checkpoint` on every observer (spec.md
    /// §4.H "save intermediate observer results").
    pub fn checkpoints(&self) -> &[serde_json::Value] {
        &self.checkpoints
    }

    /// Runs every period in the schedule (spec.md §4.H). Both the main
    /// and emigrant shadow populations are stepped through the same
    /// operator graph each period (emigrants still age and die while
    /// away); only the main population drives observers and migration,
    /// and only for periods that actually advance (the schedule's final
    /// date gets one last settling step with no forward period).
    pub fn run(&mut self) {
        let n = self.immutable.schedule.size();
        for k in 0..n {
            let asof = self.immutable.schedule.date(k);
            let period_end = if k + 1 < n { self.immutable.schedule.date(k + 1) } else { asof };

            self.step(false, asof, period_end);
            self.step(true, asof, period_end);

            if period_end > asof {
                self.run_observers(period_end, asof, k);
                self.run_migration(asof, period_end);
            }

            if k + 1 < n {
                self.checkpoints.push(self.checkpoint_observers());
            }
            self.mutable.advance_date_index(k + 1);
        }
    }

    /// # Panics
    /// Panics if the active operator subset fails either the per-period
    /// or per-actor feature consistency check (spec.md §4.D.2-3, §7
    /// "Builder or step raises a logic error").
    fn step(&mut self, is_main: bool, asof: Date, period_end: Date) {
        let mut population = if is_main { std::mem::take(&mut self.main) } else { std::mem::take(&mut self.emigrants) };

        let active = feature::active_subset(&self.operators, &self.operator_order, asof);
        assert!(
            feature::period_requirements_satisfied(&active, &self.ignore, &self.externally_required),
            "Simulator::step: period feature requirements unsatisfied at {asof}"
        );
        assert!(
            feature::actor_consistency_holds(&active, &population, &self.ignore),
            "Simulator::step: per-actor feature requirements unsatisfied at {asof}"
        );

        for op in active.iter() {
            operator::apply_to_population(*op, &mut population, asof, period_end, &self.immutable.registry, &mut self.mutable);
        }

        if self.config.newborns_enabled {
            for child in self.mutable.drain_newborns() {
                population.insert(child);
            }
        } else {
            for actor in population.iter_mut() {
                actor.unlink_children_from(asof);
            }
            self.mutable.drain_newborns();
        }

        if is_main {
            self.main = population;
        } else {
            self.emigrants = population;
        }
    }

    fn run_observers(&mut self, asof: Date, period_start: Date, date_index: usize) {
        let eval = EvalContext { asof, registry: &self.immutable.registry };
        let immigrants: Vec<Person> = self.mutable.immigrants().to_vec();
        let emigrants: Vec<Person> = self.mutable.emigrants().values().flatten().cloned().collect();
        for observer in &mut self.observers {
            observer.observe(&self.main, &immigrants, &emigrants, asof, period_start, date_index, &eval);
        }
        self.mutable.drain_immigrants();
        self.mutable.drain_emigrants();
    }

    /// Runs every migration generator in order against the main
    /// population, splicing removals into the emigrant shadow
    /// population and additions into main (spec.md §4.F), then draws
    /// return-flow returnees from the accumulated shadow population,
    /// removing each original emigrant record as its returnee rejoins
    /// main.
    fn run_migration(&mut self, asof: Date, period_end: Date) {
        let eval = EvalContext { asof, registry: &self.immutable.registry };
        for i in 0..self.migration_generators.len() {
            let result = self.migration_generators[i].generate(&self.main, asof, period_end, &eval, &mut self.mutable);
            if result.is_empty() {
                continue;
            }

            let mut removed = Vec::with_capacity(result.removed_ids.len());
            for id in result.removed_ids {
                if let Some(person) = self.main.remove(id) {
                    removed.push(person);
                }
            }
            if !removed.is_empty() {
                self.mutable.push_emigrants(period_end, removed.clone());
                for person in removed {
                    self.emigrants.insert(person);
                }
            }

            for immigrant in result.added {
                self.mutable.push_immigrant(immigrant.clone());
                self.main.insert(immigrant);
            }
        }

        if let Some(return_flow) = &self.return_flow {
            let shadow: Vec<Person> = self.emigrants.iter().cloned().collect();
            let returnees = return_flow.select_returnees(&shadow, asof, period_end, period_end, &mut self.mutable);
            for (original_id, returnee) in returnees {
                self.emigrants.remove(original_id);
                self.mutable.push_immigrant(returnee.clone());
                self.main.insert(returnee);
            }
        }
    }

    fn checkpoint_observers(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for observer in &self.observers {
            map.insert(observer.name().to_string(), observer.checkpoint());
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::date::Date;
    use crate::operator::test_support::StubOperator;
    use crate::rng::EthnicityClassification;
    use crate::schedule::Schedule;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn build(schedule: Schedule) -> Simulator {
        SimulatorBuilder::new(1)
            .schedule(schedule)
            .ethnicity(EthnicityClassification::new("default", vec!["A".to_string()]))
            .operator(Box::new(StubOperator::new("noop")))
            .build()
            .unwrap()
    }

    #[test]
    fn run_advances_through_every_period_without_panicking() {
        let schedule = Schedule::monthly(d(2020, 1, 1), 12, 3).unwrap();
        let mut sim = build(schedule);
        sim.main_population_mut().insert(crate::actor::Person::new(1, Sex::Female, 0, d(1990, 1, 1)));
        sim.run();
        assert_eq!(sim.mutable_context().date_index(), sim.immutable_context().schedule.size());
        assert_eq!(sim.checkpoints().len(), 3);
    }

    #[test]
    fn newborns_disabled_unlinks_child_records_instead_of_integrating() {
        let schedule = Schedule::monthly(d(2020, 1, 1), 12, 2).unwrap();
        let mut sim = SimulatorBuilder::new(1)
            .schedule(schedule)
            .ethnicity(EthnicityClassification::new("default", vec!["A".to_string()]))
            .newborns_enabled(false)
            .build()
            .unwrap();

        let mother_id = 1;
        let mut mother = crate::actor::Person::new(mother_id, Sex::Female, 0, d(1990, 1, 1));
        mother.add_child(d(2020, 6, 1), Some(2));
        sim.main_population_mut().insert(mother);

        sim.run();

        let mother = sim.main_population().get(mother_id).unwrap();
        assert!(mother.children().iter().all(|c| c.child_id.is_none()));
    }
}

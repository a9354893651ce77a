//! Migration generators (spec.md §4.F): per-period population movement
//! distinct from the per-actor operators in `operator/`.

pub mod exodus;
pub mod model_driven;
pub mod return_flow;
pub mod selector;

pub use exodus::ExodusGenerator;
pub use model_driven::{MigrationModel, MigrationRateCurve, ModelDrivenGenerator};
pub use return_flow::ReturnFlowGenerator;
pub use selector::{LatestImmigrantsFirst, MigrantSelector, RandomWithoutReplacement};

use crate::actor::Person;
use crate::date::Date;
use crate::predicate::EvalContext;
use crate::population::Population;
use crate::rng::MutableContext;

/// What one generator did this period: ids to remove from the main
/// population (destined for the emigrant shadow population) and fresh
/// `Person`s to add (spec.md §4.F "(removed_persons, added_person_records)").
#[derive(Debug, Default)]
pub struct MigrationResult {
    pub removed_ids: Vec<u64>,
    pub added: Vec<Person>,
}

impl MigrationResult {
    pub fn is_empty(&self) -> bool {
        self.removed_ids.is_empty() && self.added.is_empty()
    }
}

/// Shared contract for the three migration generators (spec.md §4.F).
pub trait MigrationGenerator: std::fmt::Debug {
    fn name(&self) -> &str;

    fn generate(
        &self,
        population: &Population,
        asof: Date,
        period_end: Date,
        eval: &EvalContext,
        ctx: &mut MutableContext,
    ) -> MigrationResult;
}

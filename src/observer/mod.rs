//! Observers: per-period aggregation over the population (spec.md §4.G).
//!
//! Observers never mutate actors or histories — they only read. The
//! simulator calls `observe` once per period (after newborn integration,
//! before migration, per spec.md §5's ordering guarantees) and may ask
//! for a `checkpoint` between periods to persist intermediate results
//! (spec.md §4.H "save intermediate observer results"), mirroring the
//! teacher's `flush::jsonl::write_jsonl` role for periodic output.

pub mod demographics;
pub mod statistics;

pub use demographics::{AgeRange, DemographicsKind, DemographicsObserver};
pub use statistics::{Quantity, StatisticsObserver};

use crate::actor::Person;
use crate::date::Date;
use crate::population::Population;
use crate::predicate::EvalContext;

/// Shared contract for the two observer kinds (spec.md §4.G).
pub trait Observer: std::fmt::Debug {
    fn name(&self) -> &str;

    /// `immigrants`/`emigrants` are this period's mutable-context
    /// buffers (spec.md §4.G "Emigrant/immigrant variants iterate the
    /// mutable-context buffers"); `main` is the full population,
    /// post-newborn-merge.
    fn observe(
        &mut self,
        main: &Population,
        immigrants: &[Person],
        emigrants: &[Person],
        asof: Date,
        period_start: Date,
        date_index: usize,
        eval: &EvalContext,
    );

    /// A JSON-serializable snapshot of everything accumulated so far.
    fn checkpoint(&self) -> serde_json::Value;
}

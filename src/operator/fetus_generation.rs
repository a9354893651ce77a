//! Fetus generation operator (spec.md §4.E.8): materializes fetuses for
//! a just-recorded `CONCEPTION` event — shared litter ethnicity, then a
//! per-fetus sex draw.

use std::collections::HashSet;

use super::markov::sample_category;
use super::{NewActors, Operator};
use crate::actor::{Ethnicity, Fetus, Person};
use crate::date::{months_before, Date};
use crate::feature::Feature;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;
use crate::vocabulary::CONCEPTION;

/// `ethnicity_transition[mother_ethnicity]` gives the litter-ethnicity
/// distribution; `None` means the litter simply inherits the mother's
/// ethnicity unchanged. `female_probability` is a date-indexed series
/// (sorted ascending) giving P(female) per fetus at that date.
#[derive(Debug, Clone)]
pub struct FetusGenerationModel {
    pub ethnicity_transition: Option<Vec<Vec<f64>>>,
    pub female_probability: Vec<(Date, f64)>,
}

impl FetusGenerationModel {
    fn female_probability_at(&self, d: Date) -> f64 {
        match self.female_probability.partition_point(|(date, _)| *date <= d) {
            0 => 0.5,
            i => self.female_probability[i - 1].1,
        }
    }
}

#[derive(Debug)]
pub struct FetusGenerationOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    model: FetusGenerationModel,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
    backdate_first_period: bool,
}

impl FetusGenerationOperator {
    /// `backdate_first_period` mirrors `ConceptionOperator`'s flag:
    /// `operator_fetus_generator.cpp` backdates its own read window by 9
    /// months on the first simulation date independently of conception's
    /// backdating, so a conception seeded into the past is still read.
    pub fn new(
        name: impl Into<String>,
        predicate: Box<dyn Predicate>,
        model: FetusGenerationModel,
        provides: HashSet<Feature>,
        requires: HashSet<Feature>,
        backdate_first_period: bool,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            model,
            provides,
            requires,
            backdate_first_period,
        }
    }

    fn draw_litter_ethnicity(&self, mother_ethnicity: Ethnicity, ctx: &mut MutableContext) -> Ethnicity {
        match &self.model.ethnicity_transition {
            None => mother_ethnicity,
            Some(rows) => {
                let row = &rows[mother_ethnicity as usize];
                sample_category(row, ctx.rng.next_uniform()) as Ethnicity
            }
        }
    }
}

impl Operator for FetusGenerationOperator {
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
        let Some(index) = eval.registry.index_of(CONCEPTION) else {
            return Vec::new();
        };
        let mut start = asof;
        if self.backdate_first_period && ctx.date_index() == 0 {
            start = months_before(start, 9);
        }
        let conceptions: Vec<(Date, usize)> = match actor.history(index) {
            Some(history) => history
                .entries()
                .into_iter()
                .filter(|(d, _)| *d >= start && *d < period_end)
                .map(|(d, v)| (d, v.as_int() as usize))
                .collect(),
            None => return Vec::new(),
        };
        let already_generated: HashSet<Date> = actor.fetuses().iter().map(|f| f.conception_date).collect();
        let due: Vec<(Date, usize)> = conceptions.into_iter().filter(|(d, _)| !already_generated.contains(d)).collect();

        for (conception_date, multiplicity) in due {
            let ethnicity = self.draw_litter_ethnicity(actor.ethnicity(), ctx);
            for _ in 0..multiplicity {
                let female_prob = self.model.female_probability_at(conception_date);
                let sex = if ctx.rng.next_uniform() < female_prob {
                    crate::actor::Sex::Female
                } else {
                    crate::actor::Sex::Male
                };
                actor.add_fetus(Fetus::new(sex, ethnicity, conception_date));
            }
        }
        Vec::new()
    }
}

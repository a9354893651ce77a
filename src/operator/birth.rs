//! Birth operator (spec.md §4.E.10): resolves terminating pregnancy
//! events recorded in the just-past period — dropping fetuses on
//! miscarriage, materializing them as newborn `Person`s on birth.

use std::collections::HashSet;

use super::{NewActors, Operator};
use crate::actor::{Person, Sex};
use crate::date::Date;
use crate::feature::Feature;
use crate::predicate::{EvalContext, Predicate};
use crate::rng::MutableContext;
use crate::vocabulary::{PregnancyEvent, PREGNANCY_EVENT};

#[derive(Debug)]
pub struct BirthOperator {
    name: String,
    predicate: Box<dyn Predicate>,
    provides: HashSet<Feature>,
    requires: HashSet<Feature>,
}

impl BirthOperator {
    pub fn new(name: impl Into<String>, predicate: Box<dyn Predicate>, provides: HashSet<Feature>, requires: HashSet<Feature>) -> Self {
        Self {
            name: name.into(),
            predicate,
            provides,
            requires,
        }
    }
}

impl Operator for BirthOperator {
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
        let Some(index) = eval.registry.index_of(PREGNANCY_EVENT) else {
            return Vec::new();
        };
        let terminating: Vec<(Date, PregnancyEvent)> = match actor.history(index) {
            Some(history) => history
                .entries()
                .into_iter()
                .filter(|(d, _)| *d >= asof && *d < period_end)
                .filter_map(|(d, v)| PregnancyEvent::from_code(v.as_int()).filter(|e| e.is_terminating()).map(|e| (d, e)))
                .collect(),
            None => return Vec::new(),
        };

        for (event_date, event) in terminating {
            match event {
                PregnancyEvent::Miscarriage => {
                    actor.remove_fetuses_conceived_before(event_date);
                }
                PregnancyEvent::Birth => {
                    while let Some(fetus) = actor.pop_first_fetus() {
                        let child_id = ctx.gen_id();
                        let mut child = Person::new(child_id, fetus.sex, fetus.ethnicity, event_date);
                        eval.registry.install_histories(&mut child);
                        child.set_conception_date(fetus.conception_date);
                        child.set_mother_id(actor.id());
                        actor.add_child(event_date, Some(child_id));
                        ctx.push_newborn(child);
                    }
                }
                PregnancyEvent::Conception => unreachable!("filtered to terminating events above"),
            }
        }
        Vec::new()
    }
}

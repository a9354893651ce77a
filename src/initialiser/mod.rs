//! Population initialisers (spec.md §4.I): bootstrap a starting
//! population from a reference sample, with or without family links,
//! then apply a configured sequence of perturbations.

pub mod bootstrap_unlinked;
pub mod bootstrap_with_links;
pub mod perturbation;

pub use bootstrap_unlinked::BootstrapUnlinked;
pub use bootstrap_with_links::BootstrapWithLinks;
pub use perturbation::{
    DateOfBirthJitter, PerturbDateOfBirth, PerturbHistoryValuesDouble, Perturbation, PerturbationShape,
};

use std::collections::HashMap;

use crate::actor::Person;
use crate::population::Population;
use crate::rng::MutableContext;

/// Builds the starting population for a run (spec.md §4.I).
pub trait Initialiser: std::fmt::Debug {
    fn initialise(&self, total_size: usize, ctx: &mut MutableContext) -> Population;
}

/// A fixed, indexed sample of persons to bootstrap from, keyed so a
/// mother/child id can be resolved back to its record in O(1) (grounded
/// on `InitialiserBootstrapping::PersonDataSampler`; simplified since
/// this crate has no separate mutable-`PersonData` staging layer to
/// convert a `Person` through first).
#[derive(Debug)]
pub struct ReferenceSample<'a> {
    persons: &'a [Person],
    index_by_id: HashMap<u64, usize>,
}

impl<'a> ReferenceSample<'a> {
    /// # Panics
    /// Panics if `persons` is empty (spec.md §4.I "sample cannot be
    /// empty").
    pub fn new(persons: &'a [Person]) -> Self {
        assert!(!persons.is_empty(), "ReferenceSample::new: sample must not be empty");
        let index_by_id = persons.iter().enumerate().map(|(i, p)| (p.id(), i)).collect();
        Self { persons, index_by_id }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn get(&self, idx: usize) -> &'a Person {
        &self.persons[idx]
    }

    pub fn find_by_id(&self, id: u64) -> Option<&'a Person> {
        self.index_by_id.get(&id).map(|&i| &self.persons[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::date::Date;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn find_by_id_resolves_indexed_persons() {
        let persons = vec![
            Person::new(5, Sex::Female, 0, d(1990, 1, 1)),
            Person::new(9, Sex::Male, 0, d(1985, 1, 1)),
        ];
        let sample = ReferenceSample::new(&persons);
        assert_eq!(sample.find_by_id(9).unwrap().id(), 9);
        assert!(sample.find_by_id(1).is_none());
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_sample_panics() {
        ReferenceSample::new(&[]);
    }
}

//! A population of persons keyed by id (spec.md §3 "Ownership";
//! `model/world.rs`'s `entities: BTreeMap<u64, Entity>` is the direct
//! model for this shape — it lets a child's `mother_id` resolve through
//! the map instead of a smart pointer, avoiding ownership cycles).

use std::collections::BTreeMap;

use crate::actor::Person;
use crate::date::Date;

#[derive(Debug, Default)]
pub struct Population {
    persons: BTreeMap<u64, Person>,
}

impl Population {
    pub fn new() -> Self {
        Self {
            persons: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Person> {
        self.persons.get_mut(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.persons.contains_key(&id)
    }

    /// Insert a newly constructed or imported person.
    ///
    /// # Panics
    /// Panics on a duplicate id (spec.md §3 "no two live actors share an
    /// ID" — a collision here is a bootstrapping/allocator bug, not a
    /// recoverable condition).
    pub fn insert(&mut self, person: Person) {
        let id = person.id();
        let prev = self.persons.insert(id, person);
        assert!(prev.is_none(), "Population::insert: duplicate id {id}");
    }

    pub fn remove(&mut self, id: u64) -> Option<Person> {
        self.persons.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Person> {
        self.persons.values_mut()
    }

    pub fn alive_on(&self, d: Date) -> impl Iterator<Item = &Person> {
        self.persons.values().filter(move |p| p.is_alive(d))
    }

    pub fn alive_count(&self, d: Date) -> usize {
        self.alive_on(d).count()
    }

    /// Resolve a person's mother, if any and if still present in this
    /// population (an emigrated or otherwise-removed mother resolves to
    /// `None` rather than panicking — `mother_id` is a non-owning lookup
    /// key, not a guarantee of presence).
    pub fn mother_of(&self, person: &Person) -> Option<&Person> {
        person.mother_id().and_then(|id| self.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.persons.keys().copied()
    }

    pub fn max_id(&self) -> u64 {
        self.persons.keys().next_back().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut pop = Population::new();
        pop.insert(Person::new(1, Sex::Male, 0, d(2000, 1, 1)));
        assert!(pop.contains(1));
        assert_eq!(pop.len(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate id")]
    fn duplicate_insert_panics() {
        let mut pop = Population::new();
        pop.insert(Person::new(1, Sex::Male, 0, d(2000, 1, 1)));
        pop.insert(Person::new(1, Sex::Female, 0, d(2001, 1, 1)));
    }

    #[test]
    fn mother_resolves_through_the_map() {
        let mut pop = Population::new();
        let mut child = Person::new(2, Sex::Female, 0, d(2020, 1, 1));
        child.set_mother_id(1);
        pop.insert(Person::new(1, Sex::Female, 0, d(1990, 1, 1)));
        pop.insert(child);
        let resolved = pop.mother_of(pop.get(2).unwrap()).unwrap();
        assert_eq!(resolved.id(), 1);
    }

    #[test]
    fn mother_absent_resolves_to_none() {
        let mut pop = Population::new();
        let mut child = Person::new(2, Sex::Female, 0, d(2020, 1, 1));
        child.set_mother_id(99);
        pop.insert(child);
        assert!(pop.mother_of(pop.get(2).unwrap()).is_none());
    }

    #[test]
    fn alive_count_respects_date() {
        let mut pop = Population::new();
        let mut p = Person::new(1, Sex::Male, 0, d(2000, 1, 1));
        p.die(d(2020, 1, 1));
        pop.insert(p);
        pop.insert(Person::new(2, Sex::Female, 0, d(2010, 1, 1)));
        assert_eq!(pop.alive_count(d(2019, 1, 1)), 2);
        assert_eq!(pop.alive_count(d(2021, 1, 1)), 1);
    }
}

//! Immutable and mutable simulation contexts (spec.md §3 "Immutable
//! context" / "Mutable context").

use std::collections::BTreeMap;

use super::SimRng;
use crate::actor::Person;
use crate::date::Date;
use crate::id::IdGenerator;
use crate::registry::VariableRegistry;
use crate::schedule::Schedule;

/// An ethnicity classification: a name plus an index↔name map (spec.md
/// §3, §6.6). The classification's own contents (which indices mean
/// what) are an external-collaborator concern the core treats opaquely,
/// per spec.md §1's exclusion of "ethnic-classification enumerations".
#[derive(Debug, Clone)]
pub struct EthnicityClassification {
    name: String,
    labels: Vec<String>,
}

impl EthnicityClassification {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self, ethnicity: u16) -> Option<&str> {
        self.labels.get(ethnicity as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Schedule + variable registry + ethnicity metadata: read-only for the
/// duration of a run (spec.md §3).
pub struct ImmutableContext {
    pub schedule: Schedule,
    pub registry: VariableRegistry,
    pub ethnicity: EthnicityClassification,
}

impl ImmutableContext {
    pub fn new(schedule: Schedule, registry: VariableRegistry, ethnicity: EthnicityClassification) -> Self {
        Self {
            schedule,
            registry,
            ethnicity,
        }
    }
}

/// RNG, ID allocation, the current date index, and the per-period
/// migration/newborn buffers (spec.md §3 "Mutable context"). Only the
/// simulator advances `date_index` (spec.md §5 "Ordering guarantees").
pub struct MutableContext {
    pub rng: SimRng,
    id_gen: IdGenerator,
    date_index: usize,
    newborns: Vec<Person>,
    immigrants: Vec<Person>,
    emigrants: BTreeMap<Date, Vec<Person>>,
}

impl MutableContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::new(seed),
            id_gen: IdGenerator::new(),
            date_index: 0,
            newborns: Vec::new(),
            immigrants: Vec::new(),
            emigrants: BTreeMap::new(),
        }
    }

    pub fn date_index(&self) -> usize {
        self.date_index
    }

    /// # Panics
    /// Panics if `next` does not strictly exceed the current index
    /// (spec.md §5 "the mutable context's date_index advances strictly
    /// monotonically; operators must never advance it").
    pub fn advance_date_index(&mut self, next: usize) {
        assert!(
            next > self.date_index,
            "MutableContext::advance_date_index: {next} does not advance past {}",
            self.date_index
        );
        self.date_index = next;
    }

    pub fn gen_id(&mut self) -> u64 {
        self.id_gen.next_id()
    }

    /// Register externally-assigned IDs (e.g. from a bootstrapped
    /// population) so the allocator never reissues them.
    pub fn raise_id_floor(&mut self, externally_assigned_max: u64) {
        self.id_gen.raise_floor(externally_assigned_max);
    }

    pub fn max_issued_id(&self) -> u64 {
        self.id_gen.max_issued()
    }

    /// Newborns staged this period, sorted by ID (spec.md §3).
    pub fn newborns(&self) -> &[Person] {
        &self.newborns
    }

    pub fn push_newborn(&mut self, person: Person) {
        self.newborns.push(person);
        self.newborns.sort_by_key(Person::id);
    }

    pub fn drain_newborns(&mut self) -> Vec<Person> {
        std::mem::take(&mut self.newborns)
    }

    pub fn immigrants(&self) -> &[Person] {
        &self.immigrants
    }

    pub fn push_immigrant(&mut self, person: Person) {
        self.immigrants.push(person);
    }

    pub fn drain_immigrants(&mut self) -> Vec<Person> {
        std::mem::take(&mut self.immigrants)
    }

    pub fn emigrants(&self) -> &BTreeMap<Date, Vec<Person>> {
        &self.emigrants
    }

    pub fn push_emigrants(&mut self, date: Date, mut persons: Vec<Person>) {
        let bucket = self.emigrants.entry(date).or_default();
        bucket.append(&mut persons);
        bucket.sort_by_key(Person::id);
    }

    /// Flatten and clear every buffered emigrant date bucket, e.g. once
    /// an observer has recorded them as "departed this period".
    pub fn drain_emigrants(&mut self) -> Vec<Person> {
        std::mem::take(&mut self.emigrants).into_values().flatten().collect()
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
    #[should_panic(expected = "does not advance past")]
    fn date_index_must_advance() {
        let mut ctx = MutableContext::new(1);
        ctx.advance_date_index(1);
        ctx.advance_date_index(1);
    }

    #[test]
    fn newborns_stay_sorted_by_id() {
        let mut ctx = MutableContext::new(1);
        ctx.push_newborn(Person::new(5, Sex::Female, 0, d(2020, 1, 1)));
        ctx.push_newborn(Person::new(2, Sex::Male, 0, d(2020, 1, 1)));
        let ids: Vec<u64> = ctx.newborns().iter().map(Person::id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn raise_id_floor_prevents_reissue() {
        let mut ctx = MutableContext::new(1);
        ctx.raise_id_floor(100);
        assert_eq!(ctx.gen_id(), 101);
    }
}

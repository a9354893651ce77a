//! Demographics observer (spec.md §4.G): per-period counters keyed by
//! `(age_range, ethnicity, sex)`, one bucket map per schedule date index.

use std::collections::{BTreeMap, HashMap};

use super::Observer;
use crate::actor::{Ethnicity, Person, Sex};
use crate::date::Date;
use crate::population::Population;
use crate::predicate::EvalContext;

/// A half-open age bucket `[lower, upper)`; `upper = None` means
/// unbounded above (the open-ended top bracket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgeRange {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl AgeRange {
    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        assert!(upper.is_none_or(|u| u > lower), "AgeRange: upper must exceed lower");
        Self { lower, upper }
    }

    pub fn contains(&self, age: u32) -> bool {
        age >= self.lower && self.upper.is_none_or(|u| age < u)
    }

    fn label(&self) -> String {
        match self.upper {
            Some(u) => format!("{}-{}", self.lower, u - 1),
            None => format!("{}+", self.lower),
        }
    }
}

/// Evenly spaced `[0, width), [width, 2*width), ...` brackets up to
/// `max_age`, with an open-ended top bracket catching anyone older.
pub fn even_brackets(width: u32, max_age: u32) -> Vec<AgeRange> {
    assert!(width > 0, "even_brackets: width must be positive");
    let mut ranges = Vec::new();
    let mut lower = 0;
    while lower < max_age {
        ranges.push(AgeRange::new(lower, Some(lower + width)));
        lower += width;
    }
    ranges.push(AgeRange::new(lower, None));
    ranges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DemographicsKey {
    age_range: usize,
    ethnicity: Ethnicity,
    sex: Sex,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    population: u64,
    births: u64,
    deaths: u64,
}

/// Which population this observer watches: the live main population, or
/// one of the mutable-context migration buffers (spec.md §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemographicsKind {
    Main,
    Immigrants,
    Emigrants,
}

/// Counters keyed by `(age_range, ethnicity, sex)`, one bucket map per
/// schedule date index (spec.md §4.G).
///
/// Open question resolution (recorded in DESIGN.md): the `Immigrants`/
/// `Emigrants` variants only ever populate the `population` field of
/// `Counts` (a count of arrivals/departures this period, bucketed by
/// age/ethnicity/sex as of the observation date) — `births`/`deaths`
/// stay zero, since the migration buffers carry no birth/death
/// semantics.
#[derive(Debug)]
pub struct DemographicsObserver {
    name: String,
    kind: DemographicsKind,
    age_ranges: Vec<AgeRange>,
    by_date: BTreeMap<usize, HashMap<DemographicsKey, Counts>>,
}

impl DemographicsObserver {
    pub fn new(name: impl Into<String>, kind: DemographicsKind, age_ranges: Vec<AgeRange>) -> Self {
        assert!(!age_ranges.is_empty(), "DemographicsObserver: at least one age range is required");
        Self {
            name: name.into(),
            kind,
            age_ranges,
            by_date: BTreeMap::new(),
        }
    }

    fn bracket_of(&self, age: u32) -> Option<usize> {
        self.age_ranges.iter().position(|r| r.contains(age))
    }

    fn bump(&mut self, date_index: usize, key: DemographicsKey, f: impl FnOnce(&mut Counts)) {
        let counts = self.by_date.entry(date_index).or_default().entry(key).or_default();
        f(counts);
    }

    fn observe_main(&mut self, population: &Population, asof: Date, period_start: Date, date_index: usize) {
        for person in population.iter() {
            if person.is_alive(asof) {
                if let Some(bracket) = self.bracket_of(person.age(asof)) {
                    let key = DemographicsKey { age_range: bracket, ethnicity: person.ethnicity(), sex: person.sex() };
                    self.bump(date_index, key, |c| c.population += 1);
                }
            }

            let dob = person.date_of_birth();
            if dob >= period_start && dob < asof {
                let age_for_bucket = population.mother_of(person).map_or(0, |mother| mother.age(dob));
                if let Some(bracket) = self.bracket_of(age_for_bucket) {
                    let key = DemographicsKey { age_range: bracket, ethnicity: person.ethnicity(), sex: person.sex() };
                    self.bump(date_index, key, |c| c.births += 1);
                }
            }

            if let Some(dod) = person.date_of_death() {
                if dod >= period_start && dod < asof {
                    if let Some(bracket) = self.bracket_of(person.age(dod)) {
                        let key = DemographicsKey { age_range: bracket, ethnicity: person.ethnicity(), sex: person.sex() };
                        self.bump(date_index, key, |c| c.deaths += 1);
                    }
                }
            }
        }
    }

    fn observe_buffer(&mut self, buffer: &[Person], asof: Date, date_index: usize) {
        for person in buffer {
            if let Some(bracket) = self.bracket_of(person.age(asof)) {
                let key = DemographicsKey { age_range: bracket, ethnicity: person.ethnicity(), sex: person.sex() };
                self.bump(date_index, key, |c| c.population += 1);
            }
        }
    }
}

impl Observer for DemographicsObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(
        &mut self,
        main: &Population,
        immigrants: &[Person],
        emigrants: &[Person],
        asof: Date,
        period_start: Date,
        date_index: usize,
        _eval: &EvalContext,
    ) {
        match self.kind {
            DemographicsKind::Main => self.observe_main(main, asof, period_start, date_index),
            DemographicsKind::Immigrants => self.observe_buffer(immigrants, asof, date_index),
            DemographicsKind::Emigrants => self.observe_buffer(emigrants, asof, date_index),
        }
    }

    fn checkpoint(&self) -> serde_json::Value {
        let mut dates = serde_json::Map::new();
        for (date_index, buckets) in &self.by_date {
            let mut rows: Vec<(&DemographicsKey, &Counts)> = buckets.iter().collect();
            rows.sort_by_key(|(key, _)| (key.age_range, key.ethnicity, key.sex as u8));
            let json_rows: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(key, counts)| {
                    serde_json::json!({
                        "age_range": self.age_ranges[key.age_range].label(),
                        "ethnicity": key.ethnicity,
                        "sex": format!("{:?}", key.sex),
                        "population": counts.population,
                        "births": counts.births,
                        "deaths": counts.deaths,
                    })
                })
                .collect();
            dates.insert(date_index.to_string(), serde_json::Value::Array(json_rows));
        }
        serde_json::Value::Object(dates)
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
    fn even_brackets_cover_from_zero_to_open_ended_top() {
        let ranges = even_brackets(20, 60);
        assert_eq!(ranges.len(), 4);
        assert!(ranges[0].contains(0));
        assert!(!ranges[0].contains(20));
        assert_eq!(ranges.last().unwrap().upper, None);
        assert!(ranges.last().unwrap().contains(200));
    }

    #[test]
    fn main_variant_counts_population_births_and_deaths() {
        let mut pop = Population::new();
        let mut mother = Person::new(1, Sex::Female, 0, d(1990, 1, 1));
        let mut child = Person::new(2, Sex::Female, 0, d(2020, 6, 1));
        child.set_mother_id(1);
        mother.add_child(d(2020, 6, 1), Some(2));
        let mut decedent = Person::new(3, Sex::Male, 0, d(1950, 1, 1));
        decedent.die(d(2020, 3, 1));
        pop.insert(mother);
        pop.insert(child);
        pop.insert(decedent);

        let mut observer = DemographicsObserver::new("main", DemographicsKind::Main, even_brackets(20, 80));
        let registry = crate::registry::VariableRegistry::new();
        let eval = EvalContext { asof: d(2020, 7, 1), registry: &registry };
        observer.observe(&pop, &[], &[], d(2020, 7, 1), d(2020, 1, 1), 5, &eval);

        let checkpoint = observer.checkpoint();
        let rows = checkpoint["5"].as_array().unwrap();
        let total_births: u64 = rows.iter().map(|r| r["births"].as_u64().unwrap()).sum();
        let total_deaths: u64 = rows.iter().map(|r| r["deaths"].as_u64().unwrap()).sum();
        let total_population: u64 = rows.iter().map(|r| r["population"].as_u64().unwrap()).sum();
        assert_eq!(total_births, 1);
        assert_eq!(total_deaths, 1);
        assert_eq!(total_population, 2);
    }
}

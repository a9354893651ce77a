//! Person records (spec.md §6.4): the exchange format for importing and
//! exporting actors, and the glue that turns a validated batch into a
//! `Population`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::actor::{Person, Sex};
use crate::date::Date;
use crate::error::{DataError, DomainError, Error, OutOfRangeError};
use crate::history::text;
use crate::population::Population;
use crate::registry::VariableRegistry;
use crate::rng::MutableContext;

/// One row of a person-import/export table (spec.md §6.4). `ID` is
/// optional: a record without one is assigned a fresh id on load and so
/// cannot be the target of another row's `MOTHER_ID`. History columns are
/// whatever the caller's `VariableRegistry` declares, so they're kept in
/// an open-ended map rather than fixed struct fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(rename = "ID")]
    pub id: Option<u64>,
    #[serde(rename = "SEX")]
    pub sex: String,
    #[serde(rename = "ETHNICITY")]
    pub ethnicity: Option<u16>,
    #[serde(rename = "DATE_OF_BIRTH")]
    pub date_of_birth: String,
    #[serde(rename = "MOTHER_ID")]
    pub mother_id: Option<u64>,
    #[serde(rename = "CONCEPTION_DATE")]
    pub conception_date: Option<String>,
    #[serde(rename = "DATE_OF_DEATH")]
    pub date_of_death: Option<String>,
    #[serde(rename = "UNLINKED_CHILDBIRTHS")]
    pub unlinked_childbirths: Option<String>,
    #[serde(flatten)]
    pub histories: BTreeMap<String, String>,
}

fn parse_sex(s: &str) -> Result<Sex, DataError> {
    match s {
        "MALE" => Ok(Sex::Male),
        "FEMALE" => Ok(Sex::Female),
        other => Err(DataError::UnrecognizedEnumValue {
            what: "person record SEX",
            value: other.to_string(),
        }),
    }
}

fn parse_date(s: &str) -> Result<Date, DataError> {
    Date::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| DataError::Parse {
        what: "person record date",
        detail: e.to_string(),
    })
}

fn format_date(d: Date) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Re-encode a person's unlinked child records (those with no
/// `child_id`, i.e. not materialized as a separate `PersonRecord`) back
/// into the spec.md §6.4 `UNLINKED_CHILDBIRTHS` multiplicity-series
/// text, the inverse of `text::parse_unlinked_childbirths`.
fn encode_unlinked_childbirths(person: &Person) -> Option<String> {
    let unlinked: Vec<Date> = person.children().iter().filter(|c| c.child_id.is_none()).map(|c| c.birth_date).collect();
    if unlinked.is_empty() {
        return None;
    }
    let mut out = String::from("I[");
    let mut date = unlinked[0];
    let mut count = 0u32;
    let mut first = true;
    let mut push = |date: Date, count: u32, out: &mut String, first: &mut bool| {
        if !*first {
            out.push('|');
        }
        out.push_str(&format!("{},{count}", format_date(date)));
        *first = false;
    };
    for d in &unlinked {
        if *d == date {
            count += 1;
        } else {
            push(date, count, &mut out, &mut first);
            date = *d;
            count = 1;
        }
    }
    push(date, count, &mut out, &mut first);
    out.push(']');
    Some(out)
}

impl PersonRecord {
    pub fn sex(&self) -> Result<Sex, DataError> {
        parse_sex(&self.sex)
    }

    /// Build the on-the-wire record for `person`, the inverse of
    /// `to_person`. History columns are re-encoded for every variable
    /// `registry` declares that `person` actually carries a history for;
    /// mother/conception/death dates and unlinked childbirths round-trip
    /// directly off the corresponding `Person` accessors. The linked
    /// children list (by IDs) is not recoverable from a single person in
    /// isolation — it is reconstructed batch-wide by `load_population`
    /// from every other record's `MOTHER_ID`, mirroring how `to_person`
    /// only sees one record at a time.
    pub fn from_person(person: &Person, registry: &VariableRegistry) -> Self {
        let mut histories = BTreeMap::new();
        for index in 0..registry.len() {
            if let (Some(name), Some(history)) = (registry.name(index), person.history(index)) {
                histories.insert(name.to_string(), history.to_text());
            }
        }
        PersonRecord {
            id: Some(person.id()),
            sex: match person.sex() {
                Sex::Male => "MALE".to_string(),
                Sex::Female => "FEMALE".to_string(),
            },
            ethnicity: Some(person.ethnicity()),
            date_of_birth: format_date(person.date_of_birth()),
            mother_id: person.mother_id(),
            conception_date: person.conception_date().map(format_date),
            date_of_death: person.date_of_death().map(format_date),
            unlinked_childbirths: encode_unlinked_childbirths(person),
            histories,
        }
    }

    /// Build the runtime `Person` this record describes, assigning it
    /// `id` and resolving its history columns against `registry`.
    ///
    /// # Errors
    /// `Error::Data` on a malformed field or an undeclared history
    /// column name; `Error::Domain` if `DATE_OF_DEATH` precedes
    /// `DATE_OF_BIRTH`, `CONCEPTION_DATE` does not precede it, or
    /// `UNLINKED_CHILDBIRTHS` is set on a non-female record (spec.md §7
    /// "invalid date" / "inconsistent child/parent linkage" — surfaced
    /// here rather than left to panic inside `Person`, since this is a
    /// data-loading boundary).
    pub fn to_person(&self, id: u64, registry: &VariableRegistry) -> Result<Person, Error> {
        let sex = self.sex()?;
        let date_of_birth = parse_date(&self.date_of_birth)?;
        let mut person = Person::new(id, sex, self.ethnicity.unwrap_or(0), date_of_birth);

        if let Some(mother_id) = self.mother_id {
            person.set_mother_id(mother_id);
        }

        if let Some(raw) = &self.conception_date {
            let conception_date = parse_date(raw)?;
            if conception_date >= date_of_birth {
                return Err(DomainError::InvalidValue {
                    what: "person record CONCEPTION_DATE",
                    detail: format!("{conception_date} does not precede DATE_OF_BIRTH {date_of_birth}"),
                }
                .into());
            }
            person.set_conception_date(conception_date);
        }

        if let Some(raw) = &self.date_of_death {
            let date_of_death = parse_date(raw)?;
            if date_of_death < date_of_birth {
                return Err(DomainError::InvalidValue {
                    what: "person record DATE_OF_DEATH",
                    detail: format!("{date_of_death} precedes DATE_OF_BIRTH {date_of_birth}"),
                }
                .into());
            }
            person.die(date_of_death);
        }

        if let Some(raw) = &self.unlinked_childbirths {
            let births = text::parse_unlinked_childbirths(raw)?;
            if !births.is_empty() && sex != Sex::Female {
                return Err(DomainError::InconsistentLinkage {
                    detail: format!("person {id}: UNLINKED_CHILDBIRTHS set on a non-female record"),
                }
                .into());
            }
            for birth_date in births {
                person.add_child(birth_date, None);
            }
        }

        for (name, encoded) in &self.histories {
            let index = registry
                .index_of(name)
                .ok_or_else(|| OutOfRangeError::UnknownVariable { name: name.clone() })?;
            let factory = registry
                .dispatcher(index)
                .expect("registry: index_of and dispatcher must agree")
                .factory();
            let history = text::parse_history(factory, encoded)?;
            person.set_history(index, history);
        }

        Ok(person)
    }
}

/// Validate spec.md §6.4's cross-record constraints: unique explicit
/// IDs, `MOTHER_ID`/`CONCEPTION_DATE` always paired, and every
/// referenced `MOTHER_ID` present among the file's own IDs.
pub fn validate_batch(records: &[PersonRecord]) -> Result<(), DataError> {
    let mut ids = HashSet::with_capacity(records.len());
    for record in records {
        if let Some(id) = record.id {
            if !ids.insert(id) {
                return Err(DataError::DuplicateId { what: "person record", id });
            }
        }
        match (record.mother_id, &record.conception_date) {
            (Some(_), None) => {
                return Err(DataError::MissingCompanionField {
                    field: "CONCEPTION_DATE",
                    companion: "MOTHER_ID",
                })
            }
            (None, Some(_)) => {
                return Err(DataError::MissingCompanionField {
                    field: "MOTHER_ID",
                    companion: "CONCEPTION_DATE",
                })
            }
            _ => {}
        }
    }
    for record in records {
        if let Some(mother_id) = record.mother_id {
            if !ids.contains(&mother_id) {
                return Err(DataError::DanglingReference {
                    what: "person record MOTHER_ID",
                    id: mother_id,
                });
            }
        }
    }
    Ok(())
}

/// Validate and convert a whole batch into a `Population`, assigning a
/// fresh id to any record that doesn't carry one and raising the id
/// allocator's floor past every explicit one, so neither can collide
/// with ids minted later in the run. A second pass then relinks every
/// record's `MOTHER_ID` into that mother's own child list (spec.md §8
/// "children list (by IDs)" round-trip), since `to_person` only sees
/// one record at a time and so can link a child to its mother but not
/// the reverse.
pub fn load_population(
    records: &[PersonRecord],
    registry: &VariableRegistry,
    ctx: &mut MutableContext,
) -> Result<Population, Error> {
    validate_batch(records)?;
    let mut population = Population::new();
    let mut linked_children: Vec<(u64, Date, u64)> = Vec::new();
    for record in records {
        let id = match record.id {
            Some(id) => {
                ctx.raise_id_floor(id);
                id
            }
            None => ctx.gen_id(),
        };
        if let Some(mother_id) = record.mother_id {
            linked_children.push((mother_id, parse_date(&record.date_of_birth)?, id));
        }
        population.insert(record.to_person(id, registry)?);
    }

    linked_children.sort_by_key(|(mother_id, dob, _)| (*mother_id, *dob));
    for (mother_id, dob, child_id) in linked_children {
        let mother = population
            .get_mut(mother_id)
            .ok_or_else(|| DataError::DanglingReference { what: "person record MOTHER_ID", id: mother_id })?;
        if mother.sex() != Sex::Female {
            return Err(DomainError::InconsistentLinkage {
                detail: format!("person {mother_id}: referenced as MOTHER_ID but is not female"),
            }
            .into());
        }
        mother.add_child(dob, Some(child_id));
    }

    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::True;
    use crate::registry::Dispatcher;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn minimal(sex: &str, dob: &str) -> PersonRecord {
        PersonRecord {
            id: None,
            sex: sex.to_string(),
            ethnicity: None,
            date_of_birth: dob.to_string(),
            mother_id: None,
            conception_date: None,
            date_of_death: None,
            unlinked_childbirths: None,
            histories: BTreeMap::new(),
        }
    }

    #[test]
    fn minimal_record_converts() {
        let registry = VariableRegistry::new();
        let record = minimal("FEMALE", "1990-01-01");
        let person = record.to_person(1, &registry).unwrap();
        assert_eq!(person.sex(), Sex::Female);
        assert_eq!(person.date_of_birth(), Date::from_ymd_opt(1990, 1, 1).unwrap());
    }

    #[test]
    fn conception_date_must_precede_birth() {
        let registry = VariableRegistry::new();
        let mut record = minimal("FEMALE", "1990-01-01");
        record.mother_id = Some(7);
        record.conception_date = Some("1990-06-01".to_string());
        assert!(record.to_person(1, &registry).is_err());
    }

    #[test]
    fn unlinked_childbirths_on_a_male_record_errors() {
        let registry = VariableRegistry::new();
        let mut record = minimal("MALE", "1990-01-01");
        record.unlinked_childbirths = Some("I[2015-01-01,1]".to_string());
        assert!(record.to_person(1, &registry).is_err());
    }

    #[test]
    fn unknown_history_column_errors() {
        let registry = VariableRegistry::new();
        let mut record = minimal("FEMALE", "1990-01-01");
        record.histories.insert("not_registered".to_string(), "D[]".to_string());
        assert!(record.to_person(1, &registry).is_err());
    }

    #[test]
    fn mother_id_without_conception_date_rejected_by_batch_validation() {
        let mut record = minimal("FEMALE", "2010-01-01");
        record.id = Some(2);
        record.mother_id = Some(99);
        let err = validate_batch(std::slice::from_ref(&record)).unwrap_err();
        assert!(matches!(err, DataError::MissingCompanionField { .. }));
    }

    #[test]
    fn dangling_mother_reference_rejected() {
        let mut child = minimal("FEMALE", "2010-01-01");
        child.id = Some(2);
        child.mother_id = Some(99);
        child.conception_date = Some("2009-01-01".to_string());
        let err = validate_batch(&[child]).unwrap_err();
        assert!(matches!(err, DataError::DanglingReference { .. }));
    }

    #[test]
    fn load_population_assigns_fresh_ids_and_resolves_histories() {
        use crate::history::text::HistoryFactory;
        use crate::history::ValueType;

        let mut registry = VariableRegistry::new();
        registry
            .register("weight", Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)))
            .unwrap();
        registry.freeze();

        let mut mother = minimal("FEMALE", "1970-01-01");
        mother.id = Some(1);
        mother
            .histories
            .insert("weight".to_string(), "D[2000-01-01,60.0]".to_string());

        let mut child = minimal("FEMALE", "2000-01-01");
        child.mother_id = Some(1);
        child.conception_date = Some("1999-04-01".to_string());

        let mut ctx = MutableContext::new(1);
        let population = load_population(&[mother, child], &registry, &mut ctx).unwrap();

        assert_eq!(population.len(), 2);
        assert!(population.get(1).unwrap().history(0).is_some());
        let resolved_child = population.iter().find(|p| p.id() != 1).unwrap();
        assert_eq!(resolved_child.mother_id(), Some(1));

        let mother = population.get(1).unwrap();
        assert_eq!(mother.children().len(), 1);
        assert_eq!(mother.children()[0].child_id, Some(resolved_child.id()));
        assert_eq!(mother.children()[0].birth_date, resolved_child.date_of_birth());
    }

    #[test]
    fn person_round_trips_through_export_and_reimport() {
        use crate::history::text::HistoryFactory;
        use crate::history::ValueType;

        let mut registry = VariableRegistry::new();
        registry
            .register("weight", Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)))
            .unwrap();
        registry
            .register("score", Dispatcher::new(Box::new(True), HistoryFactory::Sparse(ValueType::Int32)))
            .unwrap();
        registry.freeze();

        let mut mother = Person::new(1, Sex::Female, 3, d(1970, 1, 1));
        mother.die(d(2040, 1, 1));
        mother.add_fetus(crate::actor::Fetus::new(Sex::Female, 2, d(1999, 9, 1)));
        mother.add_child(d(1991, 1, 1), None);
        mother.set_history(0, text::parse_history(HistoryFactory::Dense(ValueType::Double), "D[2000-01-01,60.0|2010-01-01,65.5]").unwrap());
        mother.set_history(1, text::parse_history(HistoryFactory::Sparse(ValueType::Int32), "I[2005-01-01,7]").unwrap());

        let mut child = Person::new(2, Sex::Male, 3, d(2000, 1, 1));
        child.set_mother_id(1);
        child.set_conception_date(d(1999, 4, 1));

        let mother_record = PersonRecord::from_person(&mother, &registry);
        let child_record = PersonRecord::from_person(&child, &registry);

        let mut ctx = MutableContext::new(1);
        let population = load_population(&[mother_record, child_record], &registry, &mut ctx).unwrap();

        let reimported_mother = population.get(1).unwrap();
        assert_eq!(reimported_mother.sex(), Sex::Female);
        assert_eq!(reimported_mother.ethnicity(), 3);
        assert_eq!(reimported_mother.date_of_birth(), d(1970, 1, 1));
        assert_eq!(reimported_mother.date_of_death(), Some(d(2040, 1, 1)));
        assert_eq!(reimported_mother.history(0).unwrap().last_as_double(d(2010, 1, 1)), Some(65.5));
        assert_eq!(reimported_mother.history(0).unwrap().entries().len(), 2);
        assert_eq!(reimported_mother.history(1).unwrap().last_as_int(d(2005, 1, 1)), Some(7));

        // Children list (by IDs): one unlinked birth carried on the
        // mother's own record, plus the child reconstructed from the
        // other record's MOTHER_ID.
        assert_eq!(reimported_mother.children().len(), 2);
        assert_eq!(reimported_mother.children()[0].birth_date, d(1991, 1, 1));
        assert_eq!(reimported_mother.children()[0].child_id, None);
        assert_eq!(reimported_mother.children()[1].child_id, Some(2));

        let reimported_child = population.get(2).unwrap();
        assert_eq!(reimported_child.sex(), Sex::Male);
        assert_eq!(reimported_child.mother_id(), Some(1));
        assert_eq!(reimported_child.conception_date(), Some(d(1999, 4, 1)));
        assert_eq!(reimported_child.date_of_birth(), d(2000, 1, 1));

        // Fetuses have no column in the spec.md §6.4 wire format, so
        // they do not survive export/reimport; this is the one
        // attribute this round trip doesn't cover.
        assert!(reimported_mother.fetuses().is_empty());
    }
}

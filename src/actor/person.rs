use super::{Ethnicity, Fetus, Sex};
use crate::date::Date;
use crate::history::History;

/// A materialized child: the birth date is always known; the child's own
/// `Person` may have emigrated out of the reachable population (or not yet
/// be resolvable during deserialization), hence `Option` (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct ChildRecord {
    pub birth_date: Date,
    pub child_id: Option<u64>,
}

/// A simulated individual.
///
/// Child and fetus lists are meaningful only for female actors (spec.md
/// §3 "Only female actors own child/fetus lists"); a male `Person` simply
/// keeps both empty, enforced by the mutating methods below rather than by
/// the type.
#[derive(Debug, Clone)]
pub struct Person {
    id: u64,
    sex: Sex,
    ethnicity: Ethnicity,
    date_of_birth: Date,
    date_of_death: Option<Date>,
    conception_date: Option<Date>,
    immigration_date: Option<Date>,
    mother_id: Option<u64>,
    children: Vec<ChildRecord>,
    fetuses: Vec<Fetus>,
    histories: Vec<Option<Box<dyn History>>>,
}

impl Person {
    pub fn new(id: u64, sex: Sex, ethnicity: Ethnicity, date_of_birth: Date) -> Self {
        assert!(id != 0, "Person::new: id must be nonzero");
        Self {
            id,
            sex,
            ethnicity,
            date_of_birth,
            date_of_death: None,
            conception_date: None,
            immigration_date: None,
            mother_id: None,
            children: Vec::new(),
            fetuses: Vec::new(),
            histories: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn ethnicity(&self) -> Ethnicity {
        self.ethnicity
    }

    pub fn date_of_birth(&self) -> Date {
        self.date_of_birth
    }

    pub fn date_of_death(&self) -> Option<Date> {
        self.date_of_death
    }

    pub fn conception_date(&self) -> Option<Date> {
        self.conception_date
    }

    pub fn set_conception_date(&mut self, d: Date) {
        assert!(
            d < self.date_of_birth,
            "Person::set_conception_date: conception date {d} must precede date of birth {}",
            self.date_of_birth
        );
        self.conception_date = Some(d);
    }

    pub fn immigration_date(&self) -> Option<Date> {
        self.immigration_date
    }

    /// # Panics
    /// Panics if `d` falls outside `[DOB, DOD]` (spec.md §3 invariant).
    pub fn set_immigration_date(&mut self, d: Date) {
        assert!(d >= self.date_of_birth, "immigration date precedes date of birth");
        if let Some(dod) = self.date_of_death {
            assert!(d <= dod, "immigration date follows date of death");
        }
        self.immigration_date = Some(d);
    }

    pub fn mother_id(&self) -> Option<u64> {
        self.mother_id
    }

    pub fn set_mother_id(&mut self, mother_id: u64) {
        self.mother_id = Some(mother_id);
    }

    /// Age in whole years as of `on`.
    pub fn age(&self, on: Date) -> u32 {
        crate::date::age_in_years(self.date_of_birth, on)
    }

    /// Alive iff `DOB <= on < DOD` (or DOD unset).
    pub fn is_alive(&self, on: Date) -> bool {
        on >= self.date_of_birth && self.date_of_death.map_or(true, |dod| on < dod)
    }

    /// # Panics
    /// Panics if `on < DOB`, or if the person is already dead.
    pub fn die(&mut self, on: Date) {
        assert!(on >= self.date_of_birth, "die: date {on} precedes date of birth");
        assert!(self.date_of_death.is_none(), "die: person {} is already dead", self.id);
        self.date_of_death = Some(on);
    }

    pub fn children(&self) -> &[ChildRecord] {
        &self.children
    }

    /// # Panics
    /// Panics for a male actor, or if `birth_date` does not extend the
    /// existing (birth-date-sorted) child list.
    pub fn add_child(&mut self, birth_date: Date, child_id: Option<u64>) {
        assert!(self.sex == Sex::Female, "add_child: only female actors bear children");
        if let Some(last) = self.children.last() {
            assert!(
                birth_date >= last.birth_date,
                "add_child: birth date {birth_date} precedes last recorded child {}",
                last.birth_date
            );
        }
        self.children.push(ChildRecord { birth_date, child_id });
    }

    /// Unlink (set `child_id = None` on) every child record at or after
    /// `cutoff`, used when newborn materialization is disabled for a run
    /// (spec.md §4.H step 3 "else unlink child records dated >= asof").
    pub fn unlink_children_from(&mut self, cutoff: Date) {
        for record in self.children.iter_mut() {
            if record.birth_date >= cutoff {
                record.child_id = None;
            }
        }
    }

    pub fn fetuses(&self) -> &[Fetus] {
        &self.fetuses
    }

    /// # Panics
    /// Panics for a male actor, or if `fetus.conception_date` does not
    /// extend the existing (conception-date-sorted) fetus list.
    pub fn add_fetus(&mut self, fetus: Fetus) {
        assert!(self.sex == Sex::Female, "add_fetus: only female actors carry fetuses");
        assert!(
            fetus.conception_date > self.date_of_birth,
            "add_fetus: conception date must follow mother's date of birth"
        );
        if let Some(last) = self.fetuses.last() {
            assert!(
                fetus.conception_date >= last.conception_date,
                "add_fetus: conception date out of order"
            );
        }
        self.fetuses.push(fetus);
    }

    /// Drop (and return) all fetuses conceived strictly before `cutoff`,
    /// e.g. on a miscarriage event (spec.md §4.F "Fetus termination").
    pub fn remove_fetuses_conceived_before(&mut self, cutoff: Date) -> Vec<Fetus> {
        let split = self.fetuses.partition_point(|f| f.conception_date < cutoff);
        self.fetuses.drain(..split).collect()
    }

    /// Remove and return the single earliest-conceived fetus, e.g. when
    /// materializing the next birth in a litter.
    pub fn pop_first_fetus(&mut self) -> Option<Fetus> {
        if self.fetuses.is_empty() {
            None
        } else {
            Some(self.fetuses.remove(0))
        }
    }

    pub fn history(&self, index: usize) -> Option<&dyn History> {
        self.histories.get(index)?.as_deref()
    }

    pub fn history_mut(&mut self, index: usize) -> Option<&mut dyn History> {
        self.histories.get_mut(index)?.as_deref_mut()
    }

    /// Assign a freshly built history to variable `index`, growing the
    /// history vector as needed (unselected variables stay `None`).
    pub fn set_history(&mut self, index: usize, history: Box<dyn History>) {
        if self.histories.len() <= index {
            self.histories.resize_with(index + 1, || None);
        }
        self.histories[index] = Some(history);
    }

    pub fn history_count(&self) -> usize {
        self.histories.len()
    }

    /// Clone this person's sex/ethnicity/DOB and histories onto a fresh
    /// id, dropping mother/child/fetus links, conception/immigration/
    /// death dates (spec.md §4.I "Bootstrapping (unlinked)", §4.F
    /// "model-driven migration" bootstrap-with-replacement). Callers
    /// then apply perturbations and/or stamp a fresh `immigration_date`.
    pub fn cloned_with_id(&self, new_id: u64) -> Person {
        Person {
            id: new_id,
            sex: self.sex,
            ethnicity: self.ethnicity,
            date_of_birth: self.date_of_birth,
            date_of_death: None,
            conception_date: None,
            immigration_date: None,
            mother_id: None,
            children: Vec::new(),
            fetuses: Vec::new(),
            histories: self.histories.clone(),
        }
    }

    /// Move this person's date of birth to `new_dob`, shifting
    /// `conception_date` (if known) by the same offset, and, if
    /// `shift_histories` is set, every recorded history date too
    /// (spec.md §4.I "jitter DOB within month or within year").
    pub fn perturb_date_of_birth(&mut self, new_dob: Date, shift_histories: bool) {
        let delta = new_dob - self.date_of_birth;
        self.date_of_birth = new_dob;
        if let Some(conception) = self.conception_date {
            self.conception_date = Some(conception + delta);
        }
        if shift_histories {
            for history in self.histories.iter_mut().flatten() {
                history.shift_dates(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn scenario_1_person_basics() {
        let mut p = Person::new(101, Sex::Male, 1, d(1989, 6, 4));
        assert_eq!(p.age(d(2019, 5, 5)), 29);
        assert_eq!(p.age(d(2019, 6, 4)), 30);
        assert_eq!(p.age(d(1988, 1, 1)), 0);

        assert!(p.is_alive(p.date_of_birth()));
        assert!(!p.is_alive(p.date_of_birth() - chrono::Duration::days(1)));

        p.die(d(2020, 12, 25));
        assert!(p.is_alive(d(2020, 12, 24)));
        assert!(!p.is_alive(d(2020, 12, 25)));
    }

    #[test]
    #[should_panic(expected = "already dead")]
    fn die_twice_panics() {
        let mut p = Person::new(1, Sex::Female, 0, d(2000, 1, 1));
        p.die(d(2020, 1, 1));
        p.die(d(2021, 1, 1));
    }

    #[test]
    #[should_panic(expected = "only female actors bear children")]
    fn male_cannot_bear_children() {
        let mut p = Person::new(1, Sex::Male, 0, d(2000, 1, 1));
        p.add_child(d(2020, 1, 1), Some(2));
    }

    #[test]
    fn children_and_fetuses_stay_sorted() {
        let mut m = Person::new(1, Sex::Female, 0, d(1980, 1, 1));
        m.add_fetus(Fetus::new(Sex::Female, 0, d(2005, 1, 1)));
        m.add_fetus(Fetus::new(Sex::Male, 0, d(2007, 1, 1)));
        assert_eq!(m.fetuses().len(), 2);

        m.add_child(d(2005, 9, 1), Some(2));
        m.add_child(d(2007, 9, 1), Some(3));
        assert_eq!(m.children().len(), 2);
        assert_eq!(m.children()[0].birth_date, d(2005, 9, 1));
    }

    #[test]
    fn remove_fetuses_conceived_before_splits_correctly() {
        let mut m = Person::new(1, Sex::Female, 0, d(1980, 1, 1));
        m.add_fetus(Fetus::new(Sex::Female, 0, d(2005, 1, 1)));
        m.add_fetus(Fetus::new(Sex::Male, 0, d(2007, 1, 1)));
        let dropped = m.remove_fetuses_conceived_before(d(2006, 1, 1));
        assert_eq!(dropped.len(), 1);
        assert_eq!(m.fetuses().len(), 1);
    }
}

use super::{EvalContext, Predicate};
use crate::actor::{Ethnicity, Person};
use crate::date::Date;
use crate::history::History;
use crate::registry::VariableRegistry;
use crate::vocabulary::{PregnancyEvent, PregnancyState, PREGNANCY_EVENT};

/// Value of the named history strictly before `d` (excludes a same-date
/// entry), used by `Pregnancy`'s `at_start_of_period` evaluation — the
/// state that prevailed *entering* the period, before any same-day event
/// is recorded.
fn last_strictly_before(history: &dyn History, d: Date) -> Option<i64> {
    let entries = history.entries();
    let idx = history.first_index(d);
    entries.get(idx.checked_sub(1)?).map(|(_, v)| v.as_int())
}

#[derive(Debug, Clone, Copy)]
pub struct Sex {
    sex: crate::actor::Sex,
    alive: bool,
}

impl Sex {
    pub fn new(sex: crate::actor::Sex, alive: bool) -> Self {
        Self { sex, alive }
    }
}

impl Predicate for Sex {
    fn select(&self, actor: &Person, _ctx: &EvalContext) -> bool {
        actor.sex() == self.sex
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        actor.sex() == self.sex
    }

    fn selects_alive_only(&self) -> bool {
        self.alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Age {
    min: u32,
    max: u32,
    alive: bool,
}

impl Age {
    pub fn new(min: u32, max: u32, alive: bool) -> Self {
        Self { min, max, alive }
    }
}

impl Predicate for Age {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        let age = actor.age(ctx.asof);
        age >= self.min && age <= self.max
    }

    fn select_out_of_context(&self, _actor: &Person) -> bool {
        // No date available out of context: cannot rule anyone out.
        true
    }

    fn selects_alive_only(&self) -> bool {
        self.alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct YearOfBirth {
    min: i32,
    max: i32,
    alive: bool,
}

impl YearOfBirth {
    pub fn new(min: i32, max: i32, alive: bool) -> Self {
        Self { min, max, alive }
    }
}

impl Predicate for YearOfBirth {
    fn select(&self, actor: &Person, _ctx: &EvalContext) -> bool {
        self.select_out_of_context(actor)
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        use chrono::Datelike;
        let yob = actor.date_of_birth().year();
        yob >= self.min && yob <= self.max
    }

    fn selects_alive_only(&self) -> bool {
        self.alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone)]
pub enum EthnicityMatch {
    Single(Ethnicity),
    Range(Ethnicity, Ethnicity),
    Set(Vec<Ethnicity>),
}

#[derive(Debug, Clone)]
pub struct EthnicityPredicate {
    matcher: EthnicityMatch,
    alive: bool,
}

impl EthnicityPredicate {
    pub fn new(matcher: EthnicityMatch, alive: bool) -> Self {
        Self { matcher, alive }
    }

    fn matches(&self, e: Ethnicity) -> bool {
        match &self.matcher {
            EthnicityMatch::Single(v) => e == *v,
            EthnicityMatch::Range(lo, hi) => e >= *lo && e <= *hi,
            EthnicityMatch::Set(set) => set.contains(&e),
        }
    }
}

impl Predicate for EthnicityPredicate {
    fn select(&self, actor: &Person, _ctx: &EvalContext) -> bool {
        self.matches(actor.ethnicity())
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        self.matches(actor.ethnicity())
    }

    fn selects_alive_only(&self) -> bool {
        self.alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pregnancy {
    state: PregnancyState,
    alive: bool,
    at_start_of_period: bool,
}

impl Pregnancy {
    pub fn new(state: PregnancyState, alive: bool, at_start_of_period: bool) -> Self {
        Self {
            state,
            alive,
            at_start_of_period,
        }
    }
}

impl Predicate for Pregnancy {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        let Some(index) = ctx.registry.index_of(PREGNANCY_EVENT) else {
            return self.state == PregnancyState::NotPregnant;
        };
        let Some(history) = actor.history(index) else {
            return self.state == PregnancyState::NotPregnant;
        };
        let last_code = if self.at_start_of_period {
            last_strictly_before(history, ctx.asof)
        } else {
            history.last_as_int(ctx.asof)
        };
        let last_event = last_code.and_then(PregnancyEvent::from_code);
        PregnancyState::from(last_event) == self.state
    }

    fn select_out_of_context(&self, _actor: &Person) -> bool {
        true
    }

    fn selects_alive_only(&self) -> bool {
        self.alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImmigrationDate {
    from: Date,
    to: Date,
    allow_non_immigrants: bool,
    require_alive: bool,
}

impl ImmigrationDate {
    pub fn new(from: Date, to: Date, allow_non_immigrants: bool, require_alive: bool) -> Self {
        Self {
            from,
            to,
            allow_non_immigrants,
            require_alive,
        }
    }
}

impl Predicate for ImmigrationDate {
    fn select(&self, actor: &Person, _ctx: &EvalContext) -> bool {
        match actor.immigration_date() {
            Some(d) => d >= self.from && d < self.to,
            None => self.allow_non_immigrants,
        }
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        // `select` doesn't actually consult `ctx` — the test is purely a
        // function of the actor's own `immigration_date` — so the
        // out-of-context bound is identical to the in-context one.
        match actor.immigration_date() {
            Some(d) => d >= self.from && d < self.to,
            None => self.allow_non_immigrants,
        }
    }

    fn active(&self, date: Date) -> bool {
        self.allow_non_immigrants || date >= self.from
    }

    fn selects_alive_only(&self) -> bool {
        self.require_alive
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone)]
pub struct VariableRange {
    name: String,
    lo: f64,
    hi: f64,
    accept_missing: bool,
}

impl VariableRange {
    pub fn new(name: impl Into<String>, lo: f64, hi: f64, accept_missing: bool) -> Self {
        Self {
            name: name.into(),
            lo,
            hi,
            accept_missing,
        }
    }
}

impl Predicate for VariableRange {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        let Some(index) = ctx.registry.index_of(&self.name) else {
            return self.accept_missing;
        };
        match actor.history(index).and_then(|h| h.last_as_double(ctx.asof)) {
            Some(v) => v >= self.lo && v <= self.hi,
            None => self.accept_missing,
        }
    }

    fn select_out_of_context(&self, _actor: &Person) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Asof {
    begin: Date,
    end: Date,
}

impl Asof {
    pub fn new(begin: Date, end: Date) -> Self {
        Self { begin, end }
    }
}

impl Predicate for Asof {
    fn select(&self, _actor: &Person, ctx: &EvalContext) -> bool {
        ctx.asof >= self.begin && ctx.asof < self.end
    }

    fn select_out_of_context(&self, _actor: &Person) -> bool {
        true
    }

    fn active(&self, date: Date) -> bool {
        date < self.end
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

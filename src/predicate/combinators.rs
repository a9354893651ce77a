//! `True`/`Not`/`And`/`Or`, with the flattening and short-circuit
//! identities spec.md §4.C and §8 require of their constructors.

use super::{EvalContext, Predicate, True};
use crate::actor::Person;
use crate::date::Date;

#[derive(Debug, Clone)]
pub struct Not(pub Box<dyn Predicate>);

impl Predicate for Not {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        !self.0.select(actor, ctx)
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        // Negation flips an upper bound into a lower bound, which is not
        // generally a valid upper bound again; conservatively accept
        // unless the wrapped predicate is unconditionally true.
        !self.0.always_true_out_of_context() || !self.0.select_out_of_context(actor)
    }

    fn active(&self, date: Date) -> bool {
        // A negated predicate can fire whenever the wrapped one might
        // *not* fire, which is true unless the wrapped one is active
        // everywhere and always true.
        !(self.0.active(date) && self.0.always_true())
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }

    fn as_not(&self) -> Option<&dyn Predicate> {
        Some(self.0.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct And(Vec<Box<dyn Predicate>>);

impl Predicate for And {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        self.0.iter().all(|p| p.select(actor, ctx))
    }

    fn select_alive(&self, actor: &Person, ctx: &EvalContext) -> bool {
        self.0.iter().all(|p| p.select_alive(actor, ctx))
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        self.0.iter().all(|p| p.select_out_of_context(actor))
    }

    fn active(&self, date: Date) -> bool {
        self.0.iter().all(|p| p.active(date))
    }

    fn always_true(&self) -> bool {
        self.0.iter().all(|p| p.always_true())
    }

    fn selects_alive_only(&self) -> bool {
        self.0.iter().any(|p| p.selects_alive_only())
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }

    fn as_and(&self) -> Option<&[Box<dyn Predicate>]> {
        Some(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Or(Vec<Box<dyn Predicate>>);

impl Predicate for Or {
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool {
        self.0.iter().any(|p| p.select(actor, ctx))
    }

    fn select_alive(&self, actor: &Person, ctx: &EvalContext) -> bool {
        self.0.iter().any(|p| p.select_alive(actor, ctx))
    }

    fn select_out_of_context(&self, actor: &Person) -> bool {
        self.0.iter().any(|p| p.select_out_of_context(actor))
    }

    fn active(&self, date: Date) -> bool {
        self.0.iter().any(|p| p.active(date))
    }

    fn always_true(&self) -> bool {
        self.0.iter().any(|p| p.always_true())
    }

    fn selects_alive_only(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|p| p.selects_alive_only())
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(self.clone())
    }

    fn as_or(&self) -> Option<&[Box<dyn Predicate>]> {
        Some(&self.0)
    }
}

/// `Not(Not(p)) ≡ p` (spec.md §8).
pub fn negate(p: Box<dyn Predicate>) -> Box<dyn Predicate> {
    if let Some(inner) = p.as_not() {
        inner.clone_box()
    } else {
        Box::new(Not(p))
    }
}

/// Flattens nested `And`s and drops `True` members; `And(True, p) ≡ p`
/// and an empty conjunction is vacuously `True` (spec.md §8).
pub fn and(preds: Vec<Box<dyn Predicate>>) -> Box<dyn Predicate> {
    let mut flat = Vec::new();
    flatten(preds, &mut flat, |p| p.as_and().map(|s| s.to_vec()));
    flat.retain(|p| !p.always_true());
    match flat.len() {
        0 => Box::new(True),
        1 => flat.into_iter().next().unwrap(),
        _ => Box::new(And(flat)),
    }
}

/// Flattens nested `Or`s; `Or(True, p) ≡ True` (spec.md §8).
pub fn or(preds: Vec<Box<dyn Predicate>>) -> Box<dyn Predicate> {
    let mut flat = Vec::new();
    flatten(preds, &mut flat, |p| p.as_or().map(|s| s.to_vec()));
    if flat.iter().any(|p| p.always_true()) {
        return Box::new(True);
    }
    match flat.len() {
        0 => Box::new(True),
        1 => flat.into_iter().next().unwrap(),
        _ => Box::new(Or(flat)),
    }
}

fn flatten(
    preds: Vec<Box<dyn Predicate>>,
    out: &mut Vec<Box<dyn Predicate>>,
    same_kind: impl Fn(&dyn Predicate) -> Option<Vec<Box<dyn Predicate>>> + Copy,
) {
    for p in preds {
        if let Some(nested) = same_kind(p.as_ref()) {
            flatten(nested, out, same_kind);
        } else {
            out.push(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::predicate::person_predicates::Sex as SexPredicate;
    use crate::registry::VariableRegistry;

    fn ctx(registry: &VariableRegistry) -> EvalContext<'_> {
        EvalContext {
            asof: crate::date::Date::from_ymd_opt(2020, 1, 1).unwrap(),
            registry,
        }
    }

    #[test]
    fn and_with_true_collapses() {
        let p = and(vec![Box::new(True), Box::new(SexPredicate::new(Sex::Male, false))]);
        assert!(p.as_and().is_none(), "collapsed to the single remaining predicate");
    }

    #[test]
    fn or_with_true_collapses_to_true() {
        let p = or(vec![Box::new(True), Box::new(SexPredicate::new(Sex::Male, false))]);
        assert!(p.always_true());
    }

    #[test]
    fn double_negation_collapses() {
        let inner: Box<dyn Predicate> = Box::new(SexPredicate::new(Sex::Male, false));
        let doubled = negate(negate(inner.clone_box()));
        let registry = VariableRegistry::new();
        let c = ctx(&registry);
        let person = crate::actor::Person::new(1, Sex::Male, 0, c.asof);
        assert_eq!(inner.select(&person, &c), doubled.select(&person, &c));
    }

    #[test]
    fn nested_and_flattens() {
        let a = and(vec![Box::new(SexPredicate::new(Sex::Male, false))]);
        let b = and(vec![a, Box::new(SexPredicate::new(Sex::Female, false))]);
        assert_eq!(b.as_and().unwrap().len(), 2);
    }
}

//! Predicate algebra: composable selectors over actors (spec.md §4.C).

pub mod combinators;
pub mod person_predicates;

pub use combinators::{and, negate, or, Not};
pub use person_predicates::*;

use crate::actor::Person;
use crate::date::Date;
use crate::registry::VariableRegistry;

/// Evaluation context threaded through predicate evaluation: the date
/// being evaluated against and a registry handle for name-keyed lookups
/// (e.g. `VariableRange`'s history name).
pub struct EvalContext<'a> {
    pub asof: Date,
    pub registry: &'a VariableRegistry,
}

/// A decision procedure over an actor plus context, forming a Boolean
/// algebra (spec.md §4.C, §9 "prefer sealed enum-like variants plus a
/// generic custom escape hatch rather than deep inheritance" — here
/// realized as a small closed set of structs behind one trait object).
pub trait Predicate: std::fmt::Debug {
    /// In-context evaluation: may consult the actor's full history.
    fn select(&self, actor: &Person, ctx: &EvalContext) -> bool;

    /// May assume the actor is alive at `ctx.asof`; never stricter than
    /// `select` (default: delegate, valid for any predicate that doesn't
    /// special-case aliveness).
    fn select_alive(&self, actor: &Person, ctx: &EvalContext) -> bool {
        self.select(actor, ctx)
    }

    /// Upper bound usable without a context: must accept everything
    /// `select` accepts for *some* valid context (used by the feature
    /// scheduler's per-actor consistency check, spec.md §4.D.3).
    fn select_out_of_context(&self, actor: &Person) -> bool;

    /// Lower bound: if `false`, this predicate cannot select anyone in
    /// the period starting at `date` (default: always active).
    fn active(&self, _date: Date) -> bool {
        true
    }

    /// Whether this predicate is known to accept every actor.
    fn always_true(&self) -> bool {
        false
    }

    /// Whether `select_out_of_context` is known to accept every actor.
    fn always_true_out_of_context(&self) -> bool {
        self.always_true()
    }

    /// Whether this predicate can only ever select actors alive at
    /// `ctx.asof` (lets the simulator loop restrict iteration to a
    /// precomputed live set, spec.md §4.H step 2).
    fn selects_alive_only(&self) -> bool {
        false
    }

    /// Human-readable description, for diagnostics.
    fn print(&self) -> String {
        format!("{self:?}")
    }

    fn clone_box(&self) -> Box<dyn Predicate>;

    /// Returns the negated predicate this wraps, if `self` is a `Not`.
    /// Lets `negate` collapse `Not(Not(p))` to `p` (spec.md §8) without a
    /// generic downcasting mechanism.
    fn as_not(&self) -> Option<&dyn Predicate> {
        None
    }

    /// The flattened list of conjuncts this wraps, if `self` is an `And`.
    fn as_and(&self) -> Option<&[Box<dyn Predicate>]> {
        None
    }

    /// The flattened list of disjuncts this wraps, if `self` is an `Or`.
    fn as_or(&self) -> Option<&[Box<dyn Predicate>]> {
        None
    }
}

impl Clone for Box<dyn Predicate> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Accepts every actor unconditionally.
#[derive(Debug, Clone, Copy)]
pub struct True;

impl Predicate for True {
    fn select(&self, _actor: &Person, _ctx: &EvalContext) -> bool {
        true
    }

    fn select_out_of_context(&self, _actor: &Person) -> bool {
        true
    }

    fn always_true(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn Predicate> {
        Box::new(*self)
    }
}

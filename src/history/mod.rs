//! Per-actor, per-variable time series (spec.md §3 "History", §4.B).

mod dense;
mod sparse;
pub mod text;
pub mod value;

pub use dense::DenseHistory;
pub use sparse::SparseHistory;
pub use value::{Value, ValueType};

use crate::date::Date;

/// A semantic mapping `date -> value` for one (actor, variable) pair.
///
/// Two storage disciplines implement this trait: [`DenseHistory`] stores
/// every appended value; [`SparseHistory`] elides appends that repeat the
/// last stored value bit-for-bit, while still answering queries at
/// intermediate dates with that last stored value.
pub trait History: std::fmt::Debug {
    fn value_type(&self) -> ValueType;
    fn is_empty(&self) -> bool;
    fn first_date(&self) -> Option<Date>;
    fn last_date(&self) -> Option<Date>;
    fn size(&self) -> usize;

    /// Value at or before `d`, as `f64`. `None` if empty or `d` precedes
    /// the first stored date.
    fn last_as_double(&self, d: Date) -> Option<f64>;

    /// Value at or before `d`, as `i64`. `None` if empty or `d` precedes
    /// the first stored date.
    fn last_as_int(&self, d: Date) -> Option<i64>;

    /// Append a new value. `d` must be strictly after `last_date()`.
    ///
    /// # Panics
    /// Panics (`LogicError`, per spec.md §7 — append out of order is an
    /// internal invariant violation, not a recoverable condition) if `d`
    /// is not strictly past the current last date.
    fn append(&mut self, d: Date, v: Value);

    /// Replace the last stored value in place, keeping its date.
    ///
    /// # Panics
    /// Panics if the history is empty.
    fn correct(&mut self, v: Value);

    /// Index of the first stored entry with date `>= d` (i.e. the start of
    /// the half-open range `[d, +inf)`). Equal to `size()` if none.
    fn first_index(&self, d: Date) -> usize;

    /// Index one past the last stored entry with date `< d` (i.e. the end
    /// of the half-open range `(-inf, d)`). Equal to `first_index(d)` by
    /// construction (dates are unique and sorted), exposed separately per
    /// spec.md §3 because callers reason about the two ends of a range
    /// scan independently.
    fn last_index(&self, d: Date) -> usize {
        self.first_index(d)
    }

    /// All (date, value) pairs, in ascending date order.
    fn entries(&self) -> Vec<(Date, Value)>;

    /// Object-safe clone, so `Person` (which carries `Box<dyn History>`
    /// per variable) can itself derive `Clone` — needed when migration
    /// bootstrapping/initialisers copy an existing person's histories
    /// onto a fresh id (spec.md §4.F, §4.I).
    fn clone_box(&self) -> Box<dyn History>;

    /// Shift every stored date by `delta`, preserving order and values.
    /// Used only by a bootstrapping initialiser that jitters an actor's
    /// date of birth and wants its histories to move with it (spec.md
    /// §4.I).
    fn shift_dates(&mut self, delta: chrono::Duration);

    /// Overwrite the value at `entries()[index]` in place, keeping its
    /// date. Used by a bootstrapping perturbation that jitters a
    /// history's recorded double values (spec.md §4.I).
    ///
    /// # Panics
    /// Panics if `index >= size()`.
    fn set_value_at(&mut self, index: usize, v: Value);

    /// Append if `d` is past `last_date()`, or correct in place if `d`
    /// equals it. Domain error (panic, mirroring `append`) if `d` precedes
    /// the last date.
    fn append_or_correct(&mut self, d: Date, v: Value) {
        match self.last_date() {
            Some(last) if d == last => self.correct(v),
            Some(last) if d < last => {
                panic!("append_or_correct: date {d} precedes last date {last}")
            }
            _ => self.append(d, v),
        }
    }

    /// Render using the spec.md §6.2 text format: a leading `D` (double
    /// series) or `I` (integer series) followed by `[d1,v1|d2,v2|...]`.
    fn to_text(&self) -> String {
        let kind = if self.value_type().is_integral() { 'I' } else { 'D' };
        let mut out = String::new();
        out.push(kind);
        out.push('[');
        for (i, (d, v)) in self.entries().into_iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            if kind == 'I' {
                out.push_str(&format!("{},{}", d, v.as_int()));
            } else {
                out.push_str(&format!("{},{}", d, v.as_double()));
            }
        }
        out.push(']');
        out
    }
}

impl Clone for Box<dyn History> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Binary search helper shared by dense and sparse storage: returns the
/// index of the first entry with date `>= d`.
pub(crate) fn lower_bound(dates: &[Date], d: Date) -> usize {
    dates.partition_point(|&x| x < d)
}

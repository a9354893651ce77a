use super::{DenseHistory, History, Value, ValueType};
use crate::date::Date;

/// Wraps a dense backing store with elision: an append whose value equals
/// the last stored one (same typed bit representation) is skipped, since
/// queries already fall back to the last stored value at intermediate
/// dates (spec.md §4.B). Only dates of change carry a value.
#[derive(Debug, Clone)]
pub struct SparseHistory {
    inner: DenseHistory,
}

impl SparseHistory {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            inner: DenseHistory::new(value_type),
        }
    }
}

impl History for SparseHistory {
    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn first_date(&self) -> Option<Date> {
        self.inner.first_date()
    }

    fn last_date(&self) -> Option<Date> {
        self.inner.last_date()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn last_as_double(&self, d: Date) -> Option<f64> {
        self.inner.last_as_double(d)
    }

    fn last_as_int(&self, d: Date) -> Option<i64> {
        self.inner.last_as_int(d)
    }

    fn append(&mut self, d: Date, v: Value) {
        if let Some(last) = self.inner.last_date() {
            assert!(
                d > last,
                "History::append: date {d} does not come after last date {last}"
            );
            if let Some(&(_, last_value)) = self.inner.entries().last() {
                if last_value.same_representation(v) {
                    return; // elided: value unchanged
                }
            }
        }
        self.inner.append(d, v);
    }

    fn correct(&mut self, v: Value) {
        self.inner.correct(v);
    }

    fn first_index(&self, d: Date) -> usize {
        self.inner.first_index(d)
    }

    fn entries(&self) -> Vec<(Date, Value)> {
        self.inner.entries()
    }

    fn to_text(&self) -> String {
        self.inner.to_text()
    }

    fn clone_box(&self) -> Box<dyn History> {
        Box::new(self.clone())
    }

    fn shift_dates(&mut self, delta: chrono::Duration) {
        self.inner.shift_dates(delta);
    }

    fn set_value_at(&mut self, index: usize, v: Value) {
        self.inner.set_value_at(index, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn repeated_value_is_elided() {
        let mut h = SparseHistory::new(ValueType::Double);
        h.append(d(2020, 1, 1), Value::Double(1.0));
        h.append(d(2020, 2, 1), Value::Double(1.0));
        h.append(d(2020, 3, 1), Value::Double(1.0));
        assert_eq!(h.size(), 1);
        assert_eq!(h.last_date(), Some(d(2020, 1, 1)));
    }

    #[test]
    fn query_at_intermediate_date_returns_last_stored() {
        let mut h = SparseHistory::new(ValueType::Double);
        h.append(d(2020, 1, 1), Value::Double(1.0));
        h.append(d(2020, 6, 1), Value::Double(1.0)); // elided
        h.append(d(2021, 1, 1), Value::Double(2.0));
        assert_eq!(h.last_as_double(d(2020, 9, 1)), Some(1.0));
        assert_eq!(h.size(), 2);
    }

    #[test]
    fn changed_value_is_stored() {
        let mut h = SparseHistory::new(ValueType::Double);
        h.append(d(2020, 1, 1), Value::Double(1.0));
        h.append(d(2020, 6, 1), Value::Double(2.0));
        assert_eq!(h.size(), 2);
    }

    #[test]
    #[should_panic(expected = "does not come after")]
    fn append_out_of_order_panics_even_when_elidable() {
        let mut h = SparseHistory::new(ValueType::Double);
        h.append(d(2020, 6, 1), Value::Double(1.0));
        h.append(d(2020, 1, 1), Value::Double(1.0));
    }
}

//! Text encodings from spec.md §6.1–§6.3: history factory strings, the
//! history series literal, and the unlinked-childbirth expansion.

use super::{DenseHistory, History, SparseHistory, Value, ValueType};
use crate::date::Date;
use crate::error::DataError;

/// A parsed history factory string: `[ "sparse " ] <value-type-tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFactory {
    Dense(ValueType),
    Sparse(ValueType),
}

impl HistoryFactory {
    pub fn parse(s: &str) -> Result<Self, DataError> {
        if let Some(rest) = s.strip_prefix("sparse ") {
            Ok(HistoryFactory::Sparse(ValueType::from_tag(rest)?))
        } else {
            Ok(HistoryFactory::Dense(ValueType::from_tag(s)?))
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            HistoryFactory::Dense(t) | HistoryFactory::Sparse(t) => t,
        }
    }

    pub fn build(self) -> Box<dyn History> {
        match self {
            HistoryFactory::Dense(t) => Box::new(DenseHistory::new(t)),
            HistoryFactory::Sparse(t) => Box::new(SparseHistory::new(t)),
        }
    }
}

fn parse_date(s: &str) -> Result<Date, DataError> {
    Date::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| DataError::Parse {
        what: "history date",
        detail: e.to_string(),
    })
}

/// Parse a raw `[d1,v1|d2,v2|...]` literal into `(Date, &str)` pairs,
/// checking for strictly increasing dates. Empty string is an empty list.
fn parse_literal(body: &str) -> Result<Vec<(Date, String)>, DataError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let body = body
        .strip_prefix('[')
        .and_then(|b| b.strip_suffix(']'))
        .ok_or_else(|| DataError::Parse {
            what: "history literal",
            detail: format!("expected '[...]', got '{body}'"),
        })?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut prev: Option<Date> = None;
    for entry in body.split('|') {
        let (date_str, value_str) = entry.split_once(',').ok_or_else(|| DataError::Parse {
            what: "history literal entry",
            detail: format!("expected 'date,value', got '{entry}'"),
        })?;
        let date = parse_date(date_str)?;
        if let Some(p) = prev {
            if date <= p {
                return Err(DataError::Parse {
                    what: "history literal",
                    detail: format!("dates must be strictly increasing, got {p} then {date}"),
                });
            }
        }
        prev = Some(date);
        out.push((date, value_str.trim().to_string()));
    }
    Ok(out)
}

/// Parse the spec.md §6.2 history text format (`D[...]` or `I[...]`) into a
/// fresh history of the given storage discipline.
pub fn parse_history(factory: HistoryFactory, text: &str) -> Result<Box<dyn History>, DataError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(factory.build());
    }
    let (kind, body) = text.split_at(1);
    let is_integral = match kind {
        "D" => false,
        "I" => true,
        other => {
            return Err(DataError::Parse {
                what: "history text",
                detail: format!("expected leading 'D' or 'I', got '{other}'"),
            })
        }
    };
    if is_integral != factory.value_type().is_integral() {
        return Err(DataError::Parse {
            what: "history text",
            detail: "series kind (D/I) does not match the declared value type".to_string(),
        });
    }
    let entries = parse_literal(body)?;
    let mut history = factory.build();
    for (date, value_str) in entries {
        let value = parse_value(factory.value_type(), &value_str)?;
        history.append(date, value);
    }
    Ok(history)
}

fn parse_value(ty: ValueType, s: &str) -> Result<Value, DataError> {
    let err = |detail: String| DataError::Parse {
        what: "history value",
        detail,
    };
    Ok(match ty {
        ValueType::Double => Value::Double(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::Float => Value::Float(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::Int8 => Value::Int8(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::Int16 => Value::Int16(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::Int32 => Value::Int32(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::UInt8 => Value::UInt8(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::UInt16 => Value::UInt16(s.parse().map_err(|_| err(s.to_string()))?),
        ValueType::UInt32 => Value::UInt32(s.parse().map_err(|_| err(s.to_string()))?),
    })
}

/// Parse the spec.md §6.3 unlinked-childbirth format: the same time-series
/// literal with an integer multiplicity per date, expanded into that many
/// same-dated childbirth events.
pub fn parse_unlinked_childbirths(text: &str) -> Result<Vec<Date>, DataError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let body = text.strip_prefix('I').ok_or_else(|| DataError::Parse {
        what: "unlinked childbirths",
        detail: "expected an integer-multiplicity series prefixed with 'I'".to_string(),
    })?;
    let entries = parse_literal(body)?;
    let mut out = Vec::new();
    for (date, count_str) in entries {
        let count: u32 = count_str.parse().map_err(|_| DataError::Parse {
            what: "unlinked childbirths multiplicity",
            detail: count_str.clone(),
        })?;
        for _ in 0..count {
            out.push(date);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_parses_dense_and_sparse() {
        assert_eq!(
            HistoryFactory::parse("double").unwrap(),
            HistoryFactory::Dense(ValueType::Double)
        );
        assert_eq!(
            HistoryFactory::parse("sparse int32").unwrap(),
            HistoryFactory::Sparse(ValueType::Int32)
        );
    }

    #[test]
    fn empty_string_is_empty_history() {
        let h = parse_history(HistoryFactory::Dense(ValueType::Double), "").unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn parses_double_series() {
        let h = parse_history(
            HistoryFactory::Dense(ValueType::Double),
            "D[2020-01-01,1.5|2020-06-01,2.5]",
        )
        .unwrap();
        assert_eq!(h.size(), 2);
        assert_eq!(
            h.last_as_double(Date::from_ymd_opt(2020, 6, 1).unwrap()),
            Some(2.5)
        );
    }

    #[test]
    fn parses_int_series() {
        let h = parse_history(
            HistoryFactory::Dense(ValueType::Int32),
            "I[2020-01-01,5|2020-06-01,9]",
        )
        .unwrap();
        assert_eq!(
            h.last_as_int(Date::from_ymd_opt(2020, 6, 1).unwrap()),
            Some(9)
        );
    }

    #[test]
    fn non_increasing_dates_error() {
        let res = parse_history(
            HistoryFactory::Dense(ValueType::Double),
            "D[2020-06-01,1.0|2020-01-01,2.0]",
        );
        assert!(res.is_err());
    }

    #[test]
    fn unlinked_childbirths_expand_multiplicity() {
        let dates = parse_unlinked_childbirths("I[2010-01-01,2|2012-01-01,1]").unwrap();
        assert_eq!(
            dates,
            vec![
                Date::from_ymd_opt(2010, 1, 1).unwrap(),
                Date::from_ymd_opt(2010, 1, 1).unwrap(),
                Date::from_ymd_opt(2012, 1, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn unlinked_childbirths_empty_is_empty() {
        assert!(parse_unlinked_childbirths("").unwrap().is_empty());
    }

    #[test]
    fn round_trip_through_to_text() {
        let h = parse_history(
            HistoryFactory::Dense(ValueType::Double),
            "D[2020-01-01,1.5|2020-06-01,2.5]",
        )
        .unwrap();
        let text = h.to_text();
        let h2 = parse_history(HistoryFactory::Dense(ValueType::Double), &text).unwrap();
        assert_eq!(h2.entries().len(), h.entries().len());
    }
}

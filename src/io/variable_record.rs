//! Variable-declaration records (spec.md §6.5).

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DomainError};
use crate::history::text::HistoryFactory;

/// One row of a variable-declaration table: `NAME` plus `HISTORY_FACTORY`
/// (spec.md §6.5). Carries no predicate or feature metadata — pairing a
/// declared variable with a selection predicate is left to the caller
/// assembling a `VariableRegistry`; the in-memory `Dispatcher` (spec.md
/// §3) is a superset of what this exchange format carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "HISTORY_FACTORY")]
    pub history_factory: String,
}

impl VariableRecord {
    pub fn factory(&self) -> Result<HistoryFactory, DataError> {
        HistoryFactory::parse(&self.history_factory)
    }
}

/// Validate spec.md §6.5's "`NAME` non-empty" and "two rows may not
/// share a NAME" constraints, mirroring the checks
/// `VariableRegistry::register` itself performs one row at a time.
pub fn validate_batch(records: &[VariableRecord]) -> Result<(), DomainError> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    for record in records {
        if record.name.is_empty() {
            return Err(DomainError::EmptyName { what: "variable declaration NAME" });
        }
        if !seen.insert(record.name.as_str()) {
            return Err(DomainError::DuplicateVariable { name: record.name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ValueType;

    fn record(name: &str, factory: &str) -> VariableRecord {
        VariableRecord { name: name.to_string(), history_factory: factory.to_string() }
    }

    #[test]
    fn factory_parses_through_to_history_factory() {
        let r = record("weight", "sparse double");
        assert_eq!(r.factory().unwrap(), HistoryFactory::Sparse(ValueType::Double));
    }

    #[test]
    fn duplicate_names_rejected() {
        let records = vec![record("x", "double"), record("x", "int32")];
        assert!(matches!(validate_batch(&records), Err(DomainError::DuplicateVariable { .. })));
    }

    #[test]
    fn empty_name_rejected() {
        let records = vec![record("", "double")];
        assert!(matches!(validate_batch(&records), Err(DomainError::EmptyName { .. })));
    }

    #[test]
    fn distinct_names_accepted() {
        let records = vec![record("x", "double"), record("y", "sparse int8")];
        assert!(validate_batch(&records).is_ok());
    }
}

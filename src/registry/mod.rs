//! Variable registry: global, per-actor-class mapping from a stable name
//! to a dispatcher and an index (spec.md §3 "Variable registry").

pub mod dispatcher;

pub use dispatcher::Dispatcher;

use std::collections::HashMap;

use crate::actor::Person;
use crate::error::DomainError;

struct VariableEntry {
    name: String,
    dispatcher: Dispatcher,
}

/// Accumulated during builder assembly, then frozen before the
/// simulation starts (spec.md §3).
#[derive(Default)]
pub struct VariableRegistry {
    entries: Vec<VariableEntry>,
    by_name: HashMap<String, usize>,
    frozen: bool,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `DomainError::EmptyName` if `name` is empty, `DomainError::DuplicateVariable`
    /// if `name` is already registered.
    ///
    /// # Panics
    /// Panics if the registry has already been frozen (builder-ordering
    /// bug, not a user-facing condition).
    pub fn register(&mut self, name: &str, dispatcher: Dispatcher) -> Result<usize, DomainError> {
        assert!(!self.frozen, "VariableRegistry::register: registry is frozen");
        if name.is_empty() {
            return Err(DomainError::EmptyName { what: "variable name" });
        }
        if self.by_name.contains_key(name) {
            return Err(DomainError::DuplicateVariable { name: name.to_string() });
        }
        let index = self.entries.len();
        self.by_name.insert(name.to_string(), index);
        self.entries.push(VariableEntry {
            name: name.to_string(),
            dispatcher,
        });
        Ok(index)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    pub fn dispatcher(&self, index: usize) -> Option<&Dispatcher> {
        self.entries.get(index).map(|e| &e.dispatcher)
    }

    pub fn dispatchers(&self) -> impl Iterator<Item = (usize, &Dispatcher)> {
        self.entries.iter().enumerate().map(|(i, e)| (i, &e.dispatcher))
    }

    /// Build and attach fresh histories to `actor` for every variable
    /// whose dispatcher selects it. Called once at actor creation.
    pub fn install_histories(&self, actor: &mut Person) {
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.dispatcher.selects(actor) {
                actor.set_history(index, entry.dispatcher.factory().build());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::history::text::HistoryFactory;
    use crate::history::ValueType;
    use crate::predicate::True;

    #[test]
    fn empty_name_rejected() {
        let mut reg = VariableRegistry::new();
        let d = Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double));
        assert!(reg.register("", d).is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = VariableRegistry::new();
        reg.register(
            "X",
            Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)),
        )
        .unwrap();
        let dup = reg.register(
            "X",
            Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)),
        );
        assert!(dup.is_err());
    }

    #[test]
    fn install_histories_attaches_per_selection() {
        let mut reg = VariableRegistry::new();
        reg.register(
            "X",
            Dispatcher::new(Box::new(True), HistoryFactory::Dense(ValueType::Double)),
        )
        .unwrap();
        let mut p = Person::new(1, Sex::Male, 0, crate::date::Date::from_ymd_opt(2000, 1, 1).unwrap());
        reg.install_histories(&mut p);
        assert!(p.history(0).is_some());
    }
}

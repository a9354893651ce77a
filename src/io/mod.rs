//! External record formats (spec.md §6.4–§6.5): the on-the-wire shapes
//! I/O collaborators exchange with this crate, plus the validation and
//! conversion glue between a batch of them and the runtime
//! `Population`/`VariableRegistry` types. Loading these records from CSV
//! or any other on-disk format is an external collaborator's job (spec.md
//! §1 Non-goals); this module starts from an already-parsed batch.

pub mod person_record;
pub mod variable_record;

pub use person_record::PersonRecord;
pub use variable_record::VariableRecord;

pub mod actor;
pub mod date;
pub mod error;
pub mod feature;
pub mod history;
pub mod id;
pub mod initialiser;
pub mod io;
pub mod migration;
pub mod observer;
pub mod operator;
pub mod population;
pub mod predicate;
pub mod registry;
pub mod rng;
pub mod schedule;
pub mod simulator;
pub mod vocabulary;

pub use actor::{Ethnicity, Fetus, Person, Sex};
pub use date::Date;
pub use error::{DataError, DomainError, Error, OutOfRangeError, Result};
pub use feature::Feature;
pub use history::{DenseHistory, History, SparseHistory, Value, ValueType};
pub use id::IdGenerator;
pub use initialiser::{Initialiser, ReferenceSample};
pub use io::{PersonRecord, VariableRecord};
pub use operator::Operator;
pub use population::Population;
pub use rng::{ImmutableContext, MutableContext, SimRng};
pub use schedule::Schedule;
pub use simulator::{SimConfig, Simulator, SimulatorBuilder};

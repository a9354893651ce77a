use thiserror::Error;

/// Invalid arguments at construction time: null component, out-of-order
/// range, negative probability, empty required name, invalid date,
/// inconsistent child/parent linkage. Surfaced at builder time or at
/// operator construction — never during a running simulation.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{what}: empty name is not allowed")]
    EmptyName { what: &'static str },
    #[error("{what}: range [{lo}, {hi}] is out of order")]
    OutOfOrderRange { what: &'static str, lo: f64, hi: f64 },
    #[error("{what}: probability {value} is outside [0, 1]")]
    InvalidProbability { what: &'static str, value: f64 },
    #[error("{what}: value {detail} is invalid")]
    InvalidValue { what: &'static str, detail: String },
    #[error("variable '{name}' has already been registered")]
    DuplicateVariable { name: String },
    #[error("child/parent linkage inconsistent: {detail}")]
    InconsistentLinkage { detail: String },
}

/// Parsing failures, duplicate IDs, referenced-but-absent entities,
/// out-of-range enum values.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },
    #[error("duplicate id {id} in {what}")]
    DuplicateId { what: &'static str, id: u64 },
    #[error("{what} references absent entity {id}")]
    DanglingReference { what: &'static str, id: u64 },
    #[error("unrecognized enum value '{value}' for {what}")]
    UnrecognizedEnumValue { what: &'static str, value: String },
    #[error("field '{field}' is required when '{companion}' is present")]
    MissingCompanionField {
        field: &'static str,
        companion: &'static str,
    },
}

/// Lookup by ID or name not found; schedule index outside `[0, size)`.
#[derive(Debug, Error)]
pub enum OutOfRangeError {
    #[error("no entity with id {id} in {what}")]
    UnknownId { what: &'static str, id: u64 },
    #[error("no variable named '{name}'")]
    UnknownVariable { name: String },
    #[error("schedule index {index} is out of range [0, {size})")]
    ScheduleIndex { index: usize, size: usize },
}

/// Top-level error type for fallible, user-facing boundaries (builders,
/// record parsing, I/O collaborators). Internal invariant violations
/// (history append out of order, an operator failing to advance time, an
/// unsatisfiable per-actor feature requirement) are not represented here —
/// per spec they terminate the run via `panic!`, since there is no
/// meaningful way to resume a simulation with a broken invariant.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Small shared vocabularies used by both the predicate algebra and the
//! pregnancy/conception/birth operators, kept in one leaf module so
//! neither side depends on the other for these plain enums (spec.md
//! §4.C "Pregnancy", §4.E.9 "Pregnancy").

/// A discrete event recorded in the `PREGNANCY_EVENT` history. Stored as
/// an `Int32` value (`History::append`/`last_as_int`); `Conception` is
/// non-terminating, `Birth`/`Miscarriage` are terminating (spec.md
/// §4.E.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PregnancyEvent {
    Conception,
    Birth,
    Miscarriage,
}

impl PregnancyEvent {
    pub fn code(self) -> i64 {
        match self {
            PregnancyEvent::Conception => 0,
            PregnancyEvent::Birth => 1,
            PregnancyEvent::Miscarriage => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PregnancyEvent::Conception),
            1 => Some(PregnancyEvent::Birth),
            2 => Some(PregnancyEvent::Miscarriage),
            _ => None,
        }
    }

    pub fn is_terminating(self) -> bool {
        matches!(self, PregnancyEvent::Birth | PregnancyEvent::Miscarriage)
    }
}

/// The derived pregnancy state the `Pregnancy` predicate (spec.md §4.C)
/// checks for: `Pregnant` iff the most recent `PREGNANCY_EVENT` is a
/// `Conception` not yet followed by a terminating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PregnancyState {
    NotPregnant,
    Pregnant,
}

impl From<Option<PregnancyEvent>> for PregnancyState {
    fn from(last_event: Option<PregnancyEvent>) -> Self {
        match last_event {
            Some(PregnancyEvent::Conception) => PregnancyState::Pregnant,
            _ => PregnancyState::NotPregnant,
        }
    }
}

/// Name of the history variable carrying `PregnancyEvent` codes.
pub const PREGNANCY_EVENT: &str = "PREGNANCY_EVENT";

/// Name of the history variable carrying `(conception_date, multiplicity)`
/// entries (spec.md §4.E.7).
pub const CONCEPTION: &str = "CONCEPTION";

//! Run configuration (spec.md §4.H, §8(c)), mirroring the teacher's
//! `sim::runner::SimConfig` plain-struct-plus-builder idiom.

/// Settings that apply to a whole run but aren't accumulated
/// incrementally the way operators/observers/generators are.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Whether newborn materialization is enabled for this run; when
    /// `false`, `Simulator::step` unlinks child records instead of
    /// integrating them (spec.md §4.H step 3).
    pub newborns_enabled: bool,
    /// Back-dates the first simulation period by 9 months for
    /// conception/fetus-generation so the first year isn't birth-free
    /// (spec.md §4.E.7, §8(c)).
    pub backdate_first_period: bool,
}

impl SimConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            newborns_enabled: true,
            backdate_first_period: true,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

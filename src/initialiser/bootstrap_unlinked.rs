//! Unlinked bootstrapping (spec.md §4.I "Bootstrapping (unlinked)").

use super::perturbation::Perturbation;
use super::{Initialiser, ReferenceSample};
use crate::population::Population;
use crate::rng::MutableContext;

/// Repeatedly samples one person uniformly from a reference sample,
/// clones it onto a fresh id with every link dropped, and applies the
/// configured perturbations, until `total_size` is reached. Grounded on
/// `InitialiserBootstrappingUnlinked::sample` plus
/// `InitialiserBootstrapping::initialise`'s perturbation pass.
#[derive(Debug)]
pub struct BootstrapUnlinked<'a> {
    sample: ReferenceSample<'a>,
    perturbations: Vec<Box<dyn Perturbation>>,
}

impl<'a> BootstrapUnlinked<'a> {
    pub fn new(sample: ReferenceSample<'a>, perturbations: Vec<Box<dyn Perturbation>>) -> Self {
        Self { sample, perturbations }
    }
}

impl Initialiser for BootstrapUnlinked<'_> {
    fn initialise(&self, total_size: usize, ctx: &mut MutableContext) -> Population {
        let mut population = Population::new();
        for _ in 0..total_size {
            let idx = ctx.rng.next_uniform_int((self.sample.len() - 1) as u64) as usize;
            let mut person = self.sample.get(idx).cloned_with_id(ctx.gen_id());
            for perturbation in &self.perturbations {
                perturbation.apply(std::slice::from_mut(&mut person), ctx);
            }
            population.insert(person);
        }
        population
    }
}

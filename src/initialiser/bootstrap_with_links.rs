//! Linked-family bootstrapping (spec.md §4.I "Bootstrapping (with
//! links)").

use std::collections::{HashMap, HashSet};

use super::perturbation::Perturbation;
use super::{Initialiser, ReferenceSample};
use crate::actor::Person;
use crate::population::Population;
use crate::rng::MutableContext;

/// Draws a seed person, walks its mother/children graph up to
/// `recursion_limit` generations away, and clones the whole reachable
/// family (fresh ids, preserved mother/child links and conception dates)
/// if it fits within the remaining quota; otherwise clones only the
/// seed. Grounded on
/// `InitialiserBootstrappingWithLinks::sample`/`walk_link_graph`.
///
/// Unlike the original, family size here is exactly the count of nodes
/// that will actually be cloned (nodes beyond `recursion_limit` are
/// never visited at all) rather than the original's two-pass count,
/// which could include a boundary node that gets marked visited but
/// never actioned — a discrepancy that only ever makes the original's
/// family-size estimate conservatively larger, never smaller.
#[derive(Debug)]
pub struct BootstrapWithLinks<'a> {
    sample: ReferenceSample<'a>,
    perturbations: Vec<Box<dyn Perturbation>>,
    recursion_limit: i32,
}

impl<'a> BootstrapWithLinks<'a> {
    pub fn new(sample: ReferenceSample<'a>, perturbations: Vec<Box<dyn Perturbation>>, recursion_limit: i32) -> Self {
        Self { sample, perturbations, recursion_limit: recursion_limit.max(0) }
    }

    /// Collects every person reachable from `seed_id` (inclusive) via
    /// mother/children edges within `recursion_limit` generations,
    /// each visited at most once.
    fn walk_family(&self, seed_id: u64) -> Vec<&'a Person> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.visit(seed_id, 0, &mut visited, &mut out);
        out
    }

    fn visit(&self, id: u64, depth: i32, visited: &mut HashSet<u64>, out: &mut Vec<&'a Person>) {
        if depth.abs() > self.recursion_limit || visited.contains(&id) {
            return;
        }
        visited.insert(id);
        let Some(person) = self.sample.find_by_id(id) else {
            return;
        };
        out.push(person);
        for child_id in person.children().iter().filter_map(|c| c.child_id) {
            self.visit(child_id, depth + 1, visited, out);
        }
        if let Some(mother_id) = person.mother_id() {
            self.visit(mother_id, depth - 1, visited, out);
        }
    }
}

impl Initialiser for BootstrapWithLinks<'_> {
    fn initialise(&self, total_size: usize, ctx: &mut MutableContext) -> Population {
        let mut population = Population::new();
        while population.len() < total_size {
            let remaining = total_size - population.len();
            let idx = ctx.rng.next_uniform_int((self.sample.len() - 1) as u64) as usize;
            let seed = self.sample.get(idx);
            let family = self.walk_family(seed.id());

            let mut batch = if family.len() <= remaining {
                clone_family(&family, ctx)
            } else {
                vec![seed.cloned_with_id(ctx.gen_id())]
            };

            for perturbation in &self.perturbations {
                perturbation.apply(&mut batch, ctx);
            }
            for person in batch {
                population.insert(person);
            }
        }
        population
    }
}

/// Clone every person in `family` onto a fresh id, then restore
/// mother/child links and conception dates among the clones themselves
/// (never pointing outside the cloned batch, mirroring the original's
/// `copies` id-remapping table).
fn clone_family(family: &[&Person], ctx: &mut MutableContext) -> Vec<Person> {
    let mut id_map: HashMap<u64, u64> = HashMap::with_capacity(family.len());
    let mut clones: Vec<Person> = family
        .iter()
        .map(|original| {
            let mut clone = original.cloned_with_id(ctx.gen_id());
            if let Some(conception) = original.conception_date() {
                clone.set_conception_date(conception);
            }
            id_map.insert(original.id(), clone.id());
            clone
        })
        .collect();

    for (i, original) in family.iter().enumerate() {
        if let Some(mother_id) = original.mother_id() {
            if let Some(&new_mother_id) = id_map.get(&mother_id) {
                clones[i].set_mother_id(new_mother_id);
            }
        }
        for child in original.children() {
            let new_child_id = child.child_id.and_then(|id| id_map.get(&id).copied());
            clones[i].add_child(child.birth_date, new_child_id);
        }
    }
    clones
}

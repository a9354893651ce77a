//! Migrant selectors (spec.md §4.F): pick which of a candidate set of
//! actors migrate, and apply the co-migration rule for their children.

use std::collections::HashSet;

use crate::actor::Person;
use crate::date::Date;
use crate::population::Population;
use crate::rng::MutableContext;

/// Chooses up to `count` ids from `candidates` (fewer if the pool is
/// smaller). `candidates` is de-duplicated and order-independent from
/// the caller's point of view — callers pass it in a stable order (by
/// id) so `LatestImmigrantsFirst` behaves deterministically for ties.
pub trait MigrantSelector: std::fmt::Debug {
    fn select(&self, candidates: &[&Person], count: usize, ctx: &mut MutableContext) -> Vec<u64>;
}

/// Uniform selection without replacement (spec.md §4.F).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWithoutReplacement;

impl MigrantSelector for RandomWithoutReplacement {
    fn select(&self, candidates: &[&Person], count: usize, ctx: &mut MutableContext) -> Vec<u64> {
        let mut pool: Vec<u64> = candidates.iter().map(|p| p.id()).collect();
        let take = count.min(pool.len());
        let mut chosen = Vec::with_capacity(take);
        for _ in 0..take {
            let idx = ctx.rng.next_uniform_int(pool.len() as u64 - 1) as usize;
            chosen.push(pool.swap_remove(idx));
        }
        chosen
    }
}

/// Sorted by `immigration_date` descending (most recently arrived
/// first); actors with no `immigration_date` (native-born) sort last
/// (spec.md §4.F "latest-immigrants-first ... non-immigrants last").
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestImmigrantsFirst;

impl MigrantSelector for LatestImmigrantsFirst {
    fn select(&self, candidates: &[&Person], count: usize, _ctx: &mut MutableContext) -> Vec<u64> {
        let mut sorted: Vec<&&Person> = candidates.iter().collect();
        sorted.sort_by(|a, b| match (a.immigration_date(), b.immigration_date()) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id().cmp(&b.id()),
        });
        sorted.into_iter().take(count).map(|p| p.id()).collect()
    }
}

/// Extends `selected` with any child strictly below `age_limit` linked
/// to one of the selected adults, at most once per child (spec.md §4.F
/// "co-migration rule").
pub fn apply_co_migration(selected: &mut Vec<u64>, population: &Population, asof: Date, age_limit: u32) {
    let mut seen: HashSet<u64> = selected.iter().copied().collect();
    let adults: Vec<u64> = selected.clone();
    for adult_id in adults {
        let Some(adult) = population.get(adult_id) else {
            continue;
        };
        for child in adult.children() {
            let Some(child_id) = child.child_id else {
                continue;
            };
            if seen.contains(&child_id) {
                continue;
            }
            let Some(child_person) = population.get(child_id) else {
                continue;
            };
            if child_person.is_alive(asof) && child_person.age(asof) < age_limit {
                seen.insert(child_id);
                selected.push(child_id);
            }
        }
    }
}

//! Feature tags and the operator scheduler (spec.md §4.D).

use std::collections::HashSet;

use crate::date::Date;
use crate::operator::Operator;
use crate::population::Population;

pub type Feature = String;

/// Topologically sorts operators by provides/requires: an operator whose
/// `requires` intersects another's `provides` must come after the
/// provider (spec.md §4.D.1). Operators with no ordering constraint
/// between them keep their relative input order (stable sort).
///
/// # Panics
/// Panics (logic error) if the provides/requires graph has a cycle.
pub fn topological_order(ops: &[Box<dyn Operator>]) -> Vec<usize> {
    let n = ops.len();
    let mut provider_of: std::collections::HashMap<&str, Vec<usize>> = std::collections::HashMap::new();
    for (i, op) in ops.iter().enumerate() {
        for feature in op.provides() {
            provider_of.entry(feature.as_str()).or_default().push(i);
        }
    }

    let mut in_degree = vec![0usize; n];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, op) in ops.iter().enumerate() {
        for feature in op.requires() {
            if let Some(providers) = provider_of.get(feature.as_str()) {
                for &p in providers {
                    if p != i {
                        edges[p].push(i);
                        in_degree[i] += 1;
                    }
                }
            }
        }
    }

    let mut queue: std::collections::VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &edges[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    assert!(
        order.len() == n,
        "topological_order: provides/requires graph has a cycle"
    );
    order
}

/// Per-period obligation (spec.md §4.D.2): the active subset's combined
/// `provides`, plus `externally_required`, must cover every active
/// operator's `requires` except features in `ignore` (features already
/// satisfied permanently by an earlier period, per spec.md §4.D preamble
/// on instantaneous vs. permanent requirements).
pub fn period_requirements_satisfied(
    active: &[&dyn Operator],
    ignore: &HashSet<Feature>,
    externally_required: &HashSet<Feature>,
) -> bool {
    let provided: HashSet<&str> = active.iter().flat_map(|op| op.provides()).map(String::as_str).collect();
    let available: HashSet<&str> = provided
        .into_iter()
        .chain(externally_required.iter().map(String::as_str))
        .collect();
    active.iter().all(|op| {
        op.requires()
            .iter()
            .filter(|f| !ignore.contains(f.as_str()))
            .all(|f| available.contains(f.as_str()))
    })
}

/// Per-actor obligation (spec.md §4.D.3): for every actor, the subset of
/// active operators that would select it out-of-context must have a
/// combined `provides` satisfying each member's `requires` (minus
/// `ignore`).
pub fn actor_consistency_holds(active: &[&dyn Operator], population: &Population, ignore: &HashSet<Feature>) -> bool {
    population.iter().all(|actor| {
        let subset: Vec<&&dyn Operator> = active
            .iter()
            .filter(|op| op.predicate().select_out_of_context(actor))
            .collect();
        let provided: HashSet<&str> = subset.iter().flat_map(|op| op.provides()).map(String::as_str).collect();
        subset.iter().all(|op| {
            op.requires()
                .iter()
                .filter(|f| !ignore.contains(f.as_str()))
                .all(|f| provided.contains(f.as_str()))
        })
    })
}

/// Active subset of `ops` at `date`, preserving topological order.
pub fn active_subset<'a>(ops: &'a [Box<dyn Operator>], order: &[usize], date: Date) -> Vec<&'a dyn Operator> {
    order
        .iter()
        .map(|&i| ops[i].as_ref())
        .filter(|op| op.is_active(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Sex;
    use crate::operator::test_support::StubOperator;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn topo_order_places_provider_before_consumer() {
        let ops: Vec<Box<dyn Operator>> = vec![
            Box::new(StubOperator::new("consumer").requires(["F"])),
            Box::new(StubOperator::new("provider").provides(["F"])),
        ];
        let order = topological_order(&ops);
        let provider_pos = order.iter().position(|&i| ops[i].name() == "provider").unwrap();
        let consumer_pos = order.iter().position(|&i| ops[i].name() == "consumer").unwrap();
        assert!(provider_pos < consumer_pos);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn topo_order_detects_cycle() {
        let ops: Vec<Box<dyn Operator>> = vec![
            Box::new(StubOperator::new("a").requires(["B"]).provides(["A"])),
            Box::new(StubOperator::new("b").requires(["A"]).provides(["B"])),
        ];
        topological_order(&ops);
    }

    #[test]
    fn scenario_6_missing_requirement_fails_then_succeeds() {
        let missing: Vec<Box<dyn Operator>> = vec![Box::new(StubOperator::new("a").requires(["F"]))];
        let active: Vec<&dyn Operator> = missing.iter().map(|op| op.as_ref()).collect();
        let empty = HashSet::new();
        assert!(!period_requirements_satisfied(&active, &empty, &empty));

        let with_provider: Vec<Box<dyn Operator>> = vec![
            Box::new(StubOperator::new("a").requires(["F"])),
            Box::new(StubOperator::new("b").provides(["F"])),
        ];
        let active2: Vec<&dyn Operator> = with_provider.iter().map(|op| op.as_ref()).collect();
        assert!(period_requirements_satisfied(&active2, &empty, &empty));
    }

    #[test]
    fn actor_consistency_detects_unsatisfied_subset() {
        use crate::population::Population;
        let mut pop = Population::new();
        pop.insert(crate::actor::Person::new(1, Sex::Male, 0, d(2000, 1, 1)));
        let ops: Vec<Box<dyn Operator>> = vec![Box::new(StubOperator::new("a").requires(["F"]))];
        let active: Vec<&dyn Operator> = ops.iter().map(|op| op.as_ref()).collect();
        let empty = HashSet::new();
        assert!(!actor_consistency_holds(&active, &pop, &empty));
    }
}

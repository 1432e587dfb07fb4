//! DAG Scheduler (component D): Kahn's-algorithm layering over a batch of
//! [`TaskSpec`]s.
//!
//! The per-layer grouping echoes the layered task-graph visiting idea in
//! `examples/other_examples/f0181559_vercel-turborepo__crates-turborepo-lib-src-task_graph-visitor-mod.rs.rs`,
//! without its `tokio`/async machinery: this crate's execution model is
//! synchronous `std::thread`s (see `executor.rs`), not an async runtime.

use std::collections::{HashMap, HashSet};

use crate::task::TaskSpec;

/// One layer of the schedule: specs that may run concurrently once every
/// prior layer has completed.
pub type Layer = Vec<TaskSpec>;

/// Build the dependency layers for a batch, in Kahn's-algorithm order.
///
/// Ties within a layer preserve input order. Errors on a dependency that
/// names an id absent from the batch, or on a cycle (reported as the
/// sorted ids of every spec that never reached zero in-degree).
pub fn schedule(specs: Vec<TaskSpec>) -> anyhow::Result<Vec<Layer>> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for spec in &specs {
        if !seen_ids.insert(spec.id.as_str()) {
            anyhow::bail!("duplicate task id in batch: {:?}", spec.id);
        }
    }

    let known_ids: HashSet<&str> = specs.iter().map(|s| s.id.as_str()).collect();
    for spec in &specs {
        for dep in &spec.dependencies {
            if !known_ids.contains(dep.as_str()) {
                anyhow::bail!("task {:?} depends on unknown task id {:?}", spec.id, dep);
            }
        }
    }

    let mut in_degree: HashMap<String, usize> = specs
        .iter()
        .map(|s| (s.id.clone(), s.dependencies.len()))
        .collect();

    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for spec in &specs {
        for dep in &spec.dependencies {
            successors.entry(dep.as_str()).or_default().push(spec.id.as_str());
        }
    }

    let mut by_id: HashMap<&str, TaskSpec> =
        specs.iter().map(|s| (s.id.as_str(), s.clone())).collect();
    let order: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();

    let mut layers = Vec::new();
    let mut remaining: HashSet<&str> = order.iter().copied().collect();

    loop {
        let ready: Vec<&str> = order
            .iter()
            .copied()
            .filter(|id| remaining.contains(id) && in_degree[*id] == 0)
            .collect();
        if ready.is_empty() {
            break;
        }

        let mut layer = Vec::with_capacity(ready.len());
        for id in &ready {
            remaining.remove(id);
            match by_id.remove(id) {
                Some(spec) => layer.push(spec),
                None => anyhow::bail!("duplicate task id in batch: {:?}", id),
            }
        }
        layers.push(layer);

        for id in &ready {
            if let Some(succs) = successors.get(id) {
                for succ in succs {
                    if let Some(d) = in_degree.get_mut(*succ) {
                        *d -= 1;
                    }
                }
            }
        }
    }

    if !remaining.is_empty() {
        let mut cyclic: Vec<&str> = remaining.into_iter().collect();
        cyclic.sort_unstable();
        anyhow::bail!("dependency cycle detected among tasks: {}", cyclic.join(", "));
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec::batch(
            id.to_string(),
            format!("task {id}"),
            None,
            deps.iter().map(|s| s.to_string()).collect(),
            None,
        )
    }

    fn layer_ids(layer: &[TaskSpec]) -> Vec<&str> {
        layer.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn linear_chain_produces_one_task_per_layer() {
        let specs = vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])];
        let layers = schedule(specs).expect("schedule");
        assert_eq!(layers.len(), 3);
        assert_eq!(layer_ids(&layers[0]), vec!["a"]);
        assert_eq!(layer_ids(&layers[1]), vec!["b"]);
        assert_eq!(layer_ids(&layers[2]), vec!["c"]);
    }

    #[test]
    fn fan_out_fan_in() {
        let specs = vec![
            spec("root", &[]),
            spec("left", &["root"]),
            spec("right", &["root"]),
            spec("join", &["left", "right"]),
        ];
        let layers = schedule(specs).expect("schedule");
        assert_eq!(layers.len(), 3);
        assert_eq!(layer_ids(&layers[0]), vec!["root"]);
        assert_eq!(layer_ids(&layers[1]), vec!["left", "right"]);
        assert_eq!(layer_ids(&layers[2]), vec!["join"]);
    }

    #[test]
    fn independent_tasks_share_one_layer_in_input_order() {
        let specs = vec![spec("b", &[]), spec("a", &[]), spec("c", &[])];
        let layers = schedule(specs).expect("schedule");
        assert_eq!(layers.len(), 1);
        assert_eq!(layer_ids(&layers[0]), vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_id_is_an_error_not_a_panic() {
        let specs = vec![spec("a", &[]), spec("a", &[])];
        let err = schedule(specs).unwrap_err();
        assert!(err.to_string().contains("duplicate task id"));
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let specs = vec![spec("a", &["ghost"])];
        let err = schedule(specs).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn cycle_is_reported_with_sorted_ids() {
        let specs = vec![spec("b", &["a"]), spec("a", &["b"])];
        let err = schedule(specs).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("a, b"));
    }

    #[test]
    fn every_spec_appears_exactly_once() {
        let specs = vec![
            spec("a", &[]),
            spec("b", &["a"]),
            spec("c", &["a"]),
            spec("d", &["b", "c"]),
        ];
        let layers = schedule(specs).expect("schedule");
        let mut all: Vec<&str> = layers.iter().flat_map(|l| layer_ids(l)).collect();
        all.sort_unstable();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
    }
}

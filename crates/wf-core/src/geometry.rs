//! Graph algorithms layered over the event graph: bounded search, simple
//! loop detection, per-state curvature, and collapse-region clustering.

use std::collections::{HashSet, VecDeque};

use uuid::Uuid;

use crate::graph::AboutnessGraph;
use crate::state::StateSpace;

/// Shortest path length in edges via bounded BFS. `Some(0)` when from == to;
/// `None` when no path exists within `max_depth` edges.
pub fn shortest_path_len(
    graph: &AboutnessGraph,
    from: Uuid,
    to: Uuid,
    max_depth: usize,
) -> Option<usize> {
    if from == to {
        return Some(0);
    }
    let mut visited: HashSet<Uuid> = HashSet::from([from]);
    let mut queue: VecDeque<(Uuid, usize)> = VecDeque::from([(from, 0)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in graph.successors(node) {
            if next == to {
                return Some(depth + 1);
            }
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }
    None
}

/// All simple (non-repeating) paths starting at `from`, each with at least
/// one edge and at most `max_depth` edges. Exponential in branching factor,
/// hence the hard depth cap.
pub fn simple_paths(graph: &AboutnessGraph, from: Uuid, max_depth: usize) -> Vec<Vec<Uuid>> {
    let mut paths = Vec::new();
    let mut current = vec![from];
    let mut on_path: HashSet<Uuid> = HashSet::from([from]);
    extend_paths(graph, &mut current, &mut on_path, max_depth, &mut paths);
    paths
}

fn extend_paths(
    graph: &AboutnessGraph,
    current: &mut Vec<Uuid>,
    on_path: &mut HashSet<Uuid>,
    remaining: usize,
    paths: &mut Vec<Vec<Uuid>>,
) {
    if remaining == 0 {
        return;
    }
    let tail = *current.last().expect("path never empty");
    for next in graph.successors(tail) {
        if !on_path.insert(next) {
            continue;
        }
        current.push(next);
        paths.push(current.clone());
        extend_paths(graph, current, on_path, remaining - 1, paths);
        current.pop();
        on_path.remove(&next);
    }
}

/// Simple loops through an occurrence: simple paths from `id` whose tail
/// has an edge back to `id`. Each loop is reported as its node sequence;
/// the closing edge is implicit, so a loop of k nodes has k edges.
pub fn loops_through(graph: &AboutnessGraph, id: Uuid, max_depth: usize) -> Vec<Vec<Uuid>> {
    simple_paths(graph, id, max_depth)
        .into_iter()
        .filter(|path| {
            let tail = *path.last().expect("path never empty");
            graph.successors(tail).contains(&id)
        })
        .collect()
}

/// Loop-density heuristic for one state: (loop count) / (average loop
/// length in edges), summed over loops through every member occurrence.
/// A state with no loops has zero curvature.
pub fn state_curvature(
    graph: &AboutnessGraph,
    space: &StateSpace,
    state_id: usize,
    max_depth: usize,
) -> f64 {
    let Some(state) = space.state(state_id) else {
        return 0.0;
    };

    let mut loop_count = 0usize;
    let mut total_len = 0usize;
    for &occ in &state.occurrences {
        for lp in loops_through(graph, occ, max_depth) {
            loop_count += 1;
            total_len += lp.len();
        }
    }

    if loop_count == 0 {
        return 0.0;
    }
    let avg_len = total_len as f64 / loop_count as f64;
    loop_count as f64 / avg_len
}

/// Curvature of every state in the space, keyed by state id.
pub fn curvature_profile(
    graph: &AboutnessGraph,
    space: &StateSpace,
    max_depth: usize,
) -> Vec<(usize, f64)> {
    (0..space.len())
        .map(|s| (s, state_curvature(graph, space, s, max_depth)))
        .collect()
}

/// A cluster of curvature-adjacent states, intended to seed a derived
/// state space.
#[derive(Clone, Debug, PartialEq)]
pub struct CollapseRegion {
    /// Member state ids, sorted ascending.
    pub state_ids: Vec<usize>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl CollapseRegion {
    fn from_members(members: &[(usize, f64)]) -> Self {
        let mut state_ids: Vec<usize> = members.iter().map(|&(s, _)| s).collect();
        state_ids.sort_unstable();
        let count = members.len();
        let min = members.iter().map(|&(_, c)| c).fold(f64::INFINITY, f64::min);
        let max = members
            .iter()
            .map(|&(_, c)| c)
            .fold(f64::NEG_INFINITY, f64::max);
        let mean = members.iter().map(|&(_, c)| c).sum::<f64>() / count as f64;
        Self {
            state_ids,
            min: round3(min),
            max: round3(max),
            mean: round3(mean),
            count,
        }
    }

    /// Stable textual signature: sorted state ids plus rounded stats.
    pub fn signature(&self) -> String {
        let ids: Vec<String> = self.state_ids.iter().map(|s| s.to_string()).collect();
        format!(
            "[{}] min={:.3} max={:.3} mean={:.3} count={}",
            ids.join(","),
            self.min,
            self.max,
            self.mean,
            self.count
        )
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Cluster states into collapse regions.
///
/// States qualify at curvature >= threshold. Qualifying states are sorted
/// by curvature descending and grouped greedily while the gap between
/// neighbors stays under half the threshold; a group becomes a region once
/// it reaches `min_cluster_size`. If no group qualifies, all qualifying
/// states fall back into a single region.
pub fn identify_collapse_regions(
    curvatures: &[(usize, f64)],
    threshold: f64,
    min_cluster_size: usize,
) -> Vec<CollapseRegion> {
    let mut qualifying: Vec<(usize, f64)> = curvatures
        .iter()
        .copied()
        .filter(|&(_, c)| c >= threshold)
        .collect();
    if qualifying.is_empty() {
        return Vec::new();
    }
    qualifying.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

    let gap_limit = threshold * 0.5;
    let mut regions = Vec::new();
    let mut group: Vec<(usize, f64)> = vec![qualifying[0]];

    for &(state, curvature) in &qualifying[1..] {
        let prev = group.last().expect("group never empty").1;
        if (prev - curvature).abs() < gap_limit {
            group.push((state, curvature));
        } else {
            if group.len() >= min_cluster_size {
                regions.push(CollapseRegion::from_members(&group));
            }
            group = vec![(state, curvature)];
        }
    }
    if group.len() >= min_cluster_size {
        regions.push(CollapseRegion::from_members(&group));
    }

    // No group made the size cut: collapse everything qualifying together.
    if regions.is_empty() {
        regions.push(CollapseRegion::from_members(&qualifying));
    }

    regions
}

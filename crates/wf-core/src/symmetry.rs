//! Directed cache of recorded operator-sequence transformations between
//! labels: path discovery (direct, inverted, or composed), operator-based
//! similarity search, and backward provenance walks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::now_unix_secs;
use crate::constants::{
    PATH_SEARCH_DEPTH, SIGNATURE_OVERLAP_FLOOR, TRANSFORM_HISTORY_CAP, WALK_BACK_STEPS,
};

/// Fixed per-tag inverse table: up↔down, charm↔bottom, strange and top
/// self-inverse. Unknown tags pass through unchanged.
pub fn inverse_operator(tag: &str) -> String {
    match tag {
        "up" => "down".to_string(),
        "down" => "up".to_string(),
        "charm" => "bottom".to_string(),
        "bottom" => "charm".to_string(),
        "strange" | "top" => tag.to_string(),
        other => other.to_string(),
    }
}

/// One named operator application inside a transformation chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryStep {
    pub operator: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub delta: Option<f64>,
    pub at: u64,
}

impl SymmetryStep {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            params: Value::Null,
            delta: None,
            at: now_unix_secs(),
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Inverse step: operator mapped through the inverse table, numeric
    /// delta sign-negated.
    pub fn inverse(&self) -> Self {
        Self {
            operator: inverse_operator(&self.operator),
            params: self.params.clone(),
            delta: self.delta.map(|d| -d),
            at: self.at,
        }
    }
}

/// A recorded or derived chain of operator steps between two labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryPath {
    pub start: String,
    pub end: String,
    pub steps: Vec<SymmetryStep>,
}

impl SymmetryPath {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            steps: Vec::new(),
        }
    }

    /// Operator tags joined in application order, e.g. "up->strange".
    pub fn sequence(&self) -> String {
        let ops: Vec<&str> = self.steps.iter().map(|s| s.operator.as_str()).collect();
        ops.join("->")
    }

    pub fn operators(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.operator.as_str()).collect()
    }

    pub fn operator_set(&self) -> BTreeSet<String> {
        self.steps.iter().map(|s| s.operator.clone()).collect()
    }

    /// Most frequent operator tag; ties resolve lexically.
    pub fn dominant_operator(&self) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.operator.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, n)| n)
            .map(|(op, _)| op.to_string())
    }

    /// Reverse direction: endpoints swapped, steps reversed and inverted.
    pub fn inverse(&self) -> Self {
        Self {
            start: self.end.clone(),
            end: self.start.clone(),
            steps: self.steps.iter().rev().map(|s| s.inverse()).collect(),
        }
    }

    /// Query-contract shape: `{startId, endId, steps, sequence}`.
    pub fn to_json(&self) -> Value {
        json!({
            "startId": self.start,
            "endId": self.end,
            "steps": self.steps.iter().map(|s| json!({
                "operator": s.operator,
                "timestamp": s.at,
            })).collect::<Vec<_>>(),
            "sequence": self.sequence(),
        })
    }
}

/// One entry in the bounded chronological transformation history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformationRecord {
    pub start: String,
    pub end: String,
    pub operators: Vec<String>,
    pub at: u64,
}

/// A path scored against a query, for similarity and signature searches.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredPath {
    pub start: String,
    pub end: String,
    pub sequence: String,
    pub score: f64,
}

/// Result of a backward provenance walk.
#[derive(Clone, Debug)]
pub struct WalkBack {
    /// Paths from the earliest known origin forward to the queried label.
    pub chain: Vec<SymmetryPath>,
    pub can_reproduce: bool,
}

/// Forward replay plan derived from a provenance walk. Pure description;
/// nothing is mutated.
#[derive(Clone, Debug)]
pub struct ReplayPlan {
    pub success: bool,
    pub origin: String,
    pub target: String,
    pub steps: Vec<SymmetryStep>,
    pub sequence: String,
}

/// Dynamic directed multigraph of recorded transformations, cached by
/// (start, end) pair.
#[derive(Clone, Debug, Default)]
pub struct SymmetryQueryEngine {
    paths: HashMap<(String, String), SymmetryPath>,
    /// Dominant operator tag → labels it touches.
    operator_index: BTreeMap<String, BTreeSet<String>>,
    history: VecDeque<TransformationRecord>,
}

impl SymmetryQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a taught transformation. Steps append to any existing cached
    /// path for the pair; the operator index is keyed by the dominant tag
    /// of the recorded steps; history is strict drop-oldest at 200.
    pub fn record_transformation(&mut self, from: &str, to: &str, steps: Vec<SymmetryStep>) {
        let operators: Vec<String> = steps.iter().map(|s| s.operator.clone()).collect();

        let key = (from.to_string(), to.to_string());
        let path = self
            .paths
            .entry(key)
            .or_insert_with(|| SymmetryPath::new(from, to));
        path.steps.extend(steps);

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for op in &operators {
            *counts.entry(op.as_str()).or_insert(0) += 1;
        }
        if let Some((dominant, _)) = counts.into_iter().max_by_key(|&(_, n)| n) {
            let labels = self.operator_index.entry(dominant.to_string()).or_default();
            labels.insert(from.to_string());
            labels.insert(to.to_string());
        }

        self.history.push_back(TransformationRecord {
            start: from.to_string(),
            end: to.to_string(),
            operators,
            at: now_unix_secs(),
        });
        while self.history.len() > TRANSFORM_HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// Find a transformation path: direct cache hit, else the inverse of a
    /// reversed hit, else a bounded BFS composition over cached edges.
    /// Absent paths are a soft miss, never an error.
    pub fn find_path(&self, from: &str, to: &str) -> Option<SymmetryPath> {
        if let Some(path) = self.paths.get(&(from.to_string(), to.to_string())) {
            return Some(path.clone());
        }
        if let Some(path) = self.paths.get(&(to.to_string(), from.to_string())) {
            return Some(path.inverse());
        }
        self.compose_path(from, to, PATH_SEARCH_DEPTH)
    }

    /// BFS over the path-cache graph, concatenating edge step lists into
    /// one combined path. Depth-capped; edges explored in sorted order for
    /// deterministic results.
    fn compose_path(&self, from: &str, to: &str, max_depth: usize) -> Option<SymmetryPath> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (start, end) in self.paths.keys() {
            adjacency.entry(start.as_str()).or_default().push(end.as_str());
        }
        for ends in adjacency.values_mut() {
            ends.sort_unstable();
        }

        let mut predecessor: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from, 0)]);
        let mut found = false;

        'search: while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &next in adjacency.get(node).into_iter().flatten() {
                if !visited.insert(next) {
                    continue;
                }
                predecessor.insert(next, node);
                if next == to {
                    found = true;
                    break 'search;
                }
                queue.push_back((next, depth + 1));
            }
        }
        if !found {
            return None;
        }

        // Reconstruct the label chain, then splice the cached step lists.
        let mut labels = vec![to];
        let mut cursor = to;
        while let Some(&prev) = predecessor.get(cursor) {
            labels.push(prev);
            cursor = prev;
        }
        labels.reverse();

        let mut combined = SymmetryPath::new(from, to);
        for pair in labels.windows(2) {
            let edge = self
                .paths
                .get(&(pair[0].to_string(), pair[1].to_string()))
                .expect("BFS edge exists in cache");
            combined.steps.extend(edge.steps.iter().cloned());
        }
        Some(combined)
    }

    /// Paths whose operator sequences resemble those touching `label`.
    /// Similarity is the shared-prefix ratio over the longer sequence; the
    /// shorter/longer length ratio must also clear the threshold.
    pub fn find_similar_by_operator(&self, label: &str, threshold: f64) -> Vec<ScoredPath> {
        let touching: Vec<&SymmetryPath> = self
            .sorted_paths()
            .into_iter()
            .filter(|p| p.start == label || p.end == label)
            .collect();

        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut matches: Vec<ScoredPath> = Vec::new();

        for own in &touching {
            for other in self.sorted_paths() {
                if other.start == own.start && other.end == own.end {
                    continue;
                }
                let score = sequence_similarity(&own.operators(), &other.operators());
                let len_ratio = length_ratio(own.steps.len(), other.steps.len());
                if score > threshold
                    && len_ratio > threshold
                    && seen.insert((other.start.clone(), other.end.clone()))
                {
                    matches.push(ScoredPath {
                        start: other.start.clone(),
                        end: other.end.clone(),
                        sequence: other.sequence(),
                        score,
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.start.clone(), a.end.clone()).cmp(&(b.start.clone(), b.end.clone())))
        });
        matches
    }

    /// Walk provenance backward from `label`: repeatedly pick an unvisited
    /// cached path ending at the current label and step to its start.
    /// Stops at `max_steps`, on a cycle, or when no predecessor remains.
    pub fn walk_back(&self, label: &str, max_steps: usize) -> WalkBack {
        let mut visited: BTreeSet<(String, String)> = BTreeSet::new();
        let mut chain: VecDeque<SymmetryPath> = VecDeque::new();
        let mut current = label.to_string();

        for _ in 0..max_steps {
            let predecessor = self.sorted_paths().into_iter().find(|p| {
                p.end == current && !visited.contains(&(p.start.clone(), p.end.clone()))
            });
            let Some(path) = predecessor else { break };

            visited.insert((path.start.clone(), path.end.clone()));
            current = path.start.clone();
            chain.push_front(path.clone());

            if current == label {
                break; // walked a full cycle
            }
        }

        WalkBack {
            can_reproduce: !chain.is_empty(),
            chain: chain.into(),
        }
    }

    /// Turn a provenance walk into a forward replay plan. A label with no
    /// provenance yields `success = false` with empty steps.
    pub fn reproduce(&self, label: &str) -> ReplayPlan {
        let walk = self.walk_back(label, WALK_BACK_STEPS);
        if !walk.can_reproduce {
            return ReplayPlan {
                success: false,
                origin: label.to_string(),
                target: label.to_string(),
                steps: Vec::new(),
                sequence: String::new(),
            };
        }

        let origin = walk.chain[0].start.clone();
        let steps: Vec<SymmetryStep> = walk
            .chain
            .iter()
            .flat_map(|p| p.steps.iter().cloned())
            .collect();
        let plan_path = SymmetryPath {
            start: origin.clone(),
            end: label.to_string(),
            steps,
        };
        ReplayPlan {
            success: true,
            origin,
            target: label.to_string(),
            sequence: plan_path.sequence(),
            steps: plan_path.steps,
        }
    }

    /// Score every cached path by overlap between its operator-tag set and
    /// the query set; keep overlap > 0.5, sorted descending.
    pub fn query_by_operator_signature(&self, operators: &BTreeSet<String>) -> Vec<ScoredPath> {
        let mut matches: Vec<ScoredPath> = Vec::new();
        for path in self.sorted_paths() {
            let own = path.operator_set();
            let intersection = own.intersection(operators).count();
            let union = own.union(operators).count();
            if union == 0 {
                continue;
            }
            let overlap = intersection as f64 / union as f64;
            if overlap > SIGNATURE_OVERLAP_FLOOR {
                matches.push(ScoredPath {
                    start: path.start.clone(),
                    end: path.end.clone(),
                    sequence: path.sequence(),
                    score: overlap,
                });
            }
        }
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.start.clone(), a.end.clone()).cmp(&(b.start.clone(), b.end.clone())))
        });
        matches
    }

    /// Labels indexed under an operator tag (by dominance at record time).
    pub fn labels_for_operator(&self, operator: &str) -> Option<&BTreeSet<String>> {
        self.operator_index.get(operator)
    }

    pub fn paths(&self) -> impl Iterator<Item = &SymmetryPath> {
        self.paths.values()
    }

    /// Paths in deterministic (start, end) order.
    fn sorted_paths(&self) -> Vec<&SymmetryPath> {
        let mut all: Vec<&SymmetryPath> = self.paths.values().collect();
        all.sort_by(|a, b| (&a.start, &a.end).cmp(&(&b.start, &b.end)));
        all
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &TransformationRecord> {
        self.history.iter()
    }

    pub(crate) fn restore(paths: Vec<SymmetryPath>, history: Vec<TransformationRecord>) -> Self {
        let mut engine = Self {
            paths: paths
                .into_iter()
                .map(|p| ((p.start.clone(), p.end.clone()), p))
                .collect(),
            operator_index: BTreeMap::new(),
            history: history.into(),
        };
        let index_entries: Vec<(String, String, String)> = engine
            .paths
            .values()
            .filter_map(|p| {
                p.dominant_operator()
                    .map(|op| (op, p.start.clone(), p.end.clone()))
            })
            .collect();
        for (op, start, end) in index_entries {
            let labels = engine.operator_index.entry(op).or_default();
            labels.insert(start);
            labels.insert(end);
        }
        engine
    }
}

/// Shared-prefix ratio of two operator sequences over the longer length.
fn sequence_similarity(a: &[&str], b: &[&str]) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 0.0;
    }
    let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    prefix as f64 / longer as f64
}

fn length_ratio(a: usize, b: usize) -> f64 {
    let longer = a.max(b);
    if longer == 0 {
        return 0.0;
    }
    a.min(b) as f64 / longer as f64
}

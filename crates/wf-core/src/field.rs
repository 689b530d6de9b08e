use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::now_unix_secs;
use crate::constants::{
    BASE_THRESHOLD, EPSILON, EXAMPLE_CAP, FIELD_HISTORY_CAP, MERGE_THRESHOLD,
    PATTERN_HISTORY_CAP, THRESHOLD_CEILING,
};

/// An online-learned category: label plus running-mean feature signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pattern {
    pub label: String,
    pub signature: Vec<f64>,
    pub count: u32,
    pub last_seen: u64,
    /// Rolling history of raw vectors, oldest first, capped at 10.
    pub history: Vec<Vec<f64>>,
    /// Up to 5 example strings; further examples are ignored.
    pub examples: Vec<String>,
}

/// One raw observation, kept in the field-wide bounded history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub label: String,
    pub signature: Vec<f64>,
    pub at: u64,
}

/// Inference outcome. A miss keeps the best similarity for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct Inference {
    pub label: Option<String>,
    pub similarity: f64,
}

impl Inference {
    pub fn miss(similarity: f64) -> Self {
        Self {
            label: None,
            similarity,
        }
    }

    pub fn is_match(&self) -> bool {
        self.label.is_some()
    }
}

/// Cosine similarity. Mismatched lengths or zero-magnitude vectors yield 0
/// rather than failing, so heterogeneous vectors never crash inference.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a < EPSILON || norm_b < EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Similarity floor for accepting an inference, as a pure function of the
/// live pattern count: min(0.95, 0.5 + ln(n)·0.1) for n > 1, else 0.5.
/// Recomputed at every call site — never cached.
pub fn adaptive_threshold(pattern_count: usize) -> f64 {
    if pattern_count <= 1 {
        return BASE_THRESHOLD;
    }
    (BASE_THRESHOLD + (pattern_count as f64).ln() * 0.1).min(THRESHOLD_CEILING)
}

/// Online incremental-clustering field: label → signature with running-mean
/// updates, adaptive-threshold inference, and near-duplicate merging.
#[derive(Clone, Debug, Default)]
pub struct EmergentPatternField {
    patterns: BTreeMap<String, Pattern>,
    /// Field-wide raw observation history, strict drop-oldest at 50.
    history: VecDeque<Observation>,
}

impl EmergentPatternField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn one observation. A known label updates its signature as an
    /// exact arithmetic mean over all observations (weight 1/(count+1));
    /// an unknown label starts a fresh pattern.
    pub fn learn(&mut self, label: &str, vector: &[f64], example: Option<&str>) {
        let now = now_unix_secs();

        match self.patterns.get_mut(label) {
            Some(pattern) => {
                let weight = 1.0 / (pattern.count as f64 + 1.0);
                let overlap = pattern.signature.len().min(vector.len());
                for i in 0..overlap {
                    pattern.signature[i] += (vector[i] - pattern.signature[i]) * weight;
                }
                pattern.count += 1;
                pattern.last_seen = now;
                pattern.history.push(vector.to_vec());
                if pattern.history.len() > PATTERN_HISTORY_CAP {
                    pattern.history.remove(0);
                }
                if let Some(ex) = example
                    && pattern.examples.len() < EXAMPLE_CAP
                {
                    pattern.examples.push(ex.to_string());
                }
            }
            None => {
                self.patterns.insert(
                    label.to_string(),
                    Pattern {
                        label: label.to_string(),
                        signature: vector.to_vec(),
                        count: 1,
                        last_seen: now,
                        history: vec![vector.to_vec()],
                        examples: example.map(|e| vec![e.to_string()]).unwrap_or_default(),
                    },
                );
            }
        }

        self.history.push_back(Observation {
            label: label.to_string(),
            signature: vector.to_vec(),
            at: now,
        });
        while self.history.len() > FIELD_HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// Best-cosine inference against every stored pattern. Returns the best
    /// label only when its similarity clears the adaptive threshold; a miss
    /// still reports the best similarity seen.
    pub fn infer(&self, vector: &[f64]) -> Inference {
        let mut best_label: Option<&str> = None;
        let mut best_similarity = f64::NEG_INFINITY;

        for (label, pattern) in &self.patterns {
            let similarity = cosine_similarity(vector, &pattern.signature);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_label = Some(label);
            }
        }

        let Some(label) = best_label else {
            return Inference::miss(0.0);
        };
        if best_similarity >= adaptive_threshold(self.patterns.len()) {
            Inference {
                label: Some(label.to_string()),
                similarity: best_similarity,
            }
        } else {
            Inference::miss(best_similarity)
        }
    }

    /// One merge pass: the first unordered pair above the merge cut is
    /// combined (count-weighted), the lower-count label absorbed. Callers
    /// re-invoke until `None` to converge fully.
    pub fn restructure(&mut self) -> Option<(String, String)> {
        let labels: Vec<String> = self.patterns.keys().cloned().collect();

        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                let a = &self.patterns[&labels[i]];
                let b = &self.patterns[&labels[j]];
                if cosine_similarity(&a.signature, &b.signature) <= MERGE_THRESHOLD {
                    continue;
                }

                // Lower count is absorbed; ties keep the earlier label.
                let (kept, absorbed) = if b.count > a.count {
                    (labels[j].clone(), labels[i].clone())
                } else {
                    (labels[i].clone(), labels[j].clone())
                };

                let dead = self.patterns.remove(&absorbed).expect("absorbed exists");
                let survivor = self.patterns.get_mut(&kept).expect("kept exists");

                let total = survivor.count as f64 + dead.count as f64;
                let overlap = survivor.signature.len().min(dead.signature.len());
                for k in 0..overlap {
                    survivor.signature[k] = (survivor.signature[k] * survivor.count as f64
                        + dead.signature[k] * dead.count as f64)
                        / total;
                }
                survivor.count += dead.count;
                survivor.last_seen = survivor.last_seen.max(dead.last_seen);
                survivor.history.extend(dead.history);
                if survivor.history.len() > PATTERN_HISTORY_CAP {
                    let excess = survivor.history.len() - PATTERN_HISTORY_CAP;
                    survivor.history.drain(..excess);
                }
                for ex in dead.examples {
                    if survivor.examples.len() < EXAMPLE_CAP {
                        survivor.examples.push(ex);
                    }
                }

                tracing::info!("merged pattern '{absorbed}' into '{kept}'");
                return Some((absorbed, kept));
            }
        }
        None
    }

    pub fn forget(&mut self, label: &str) -> bool {
        self.patterns.remove(label).is_some()
    }

    /// Age out stale patterns: counts halve once `half_life` has passed
    /// since last_seen, and labels that reach zero are dropped. Bounded
    /// histories are never reordered.
    pub fn decay(&mut self, now: u64, half_life: u64) {
        let mut dead: Vec<String> = Vec::new();
        for (label, pattern) in self.patterns.iter_mut() {
            if now.saturating_sub(pattern.last_seen) >= half_life {
                pattern.count /= 2;
                if pattern.count == 0 {
                    dead.push(label.clone());
                }
            }
        }
        for label in dead {
            tracing::debug!("decayed pattern '{label}' out of the field");
            self.patterns.remove(&label);
        }
    }

    pub fn get(&self, label: &str) -> Option<&Pattern> {
        self.patterns.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(|k| k.as_str())
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.history.iter()
    }

    pub(crate) fn restore(patterns: Vec<Pattern>, history: Vec<Observation>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| (p.label.clone(), p)).collect(),
            history: history.into(),
        }
    }

    /// Query-contract summary: labels, count, and per-pattern signature.
    pub fn to_json(&self) -> Value {
        let mut patterns = serde_json::Map::new();
        for (label, p) in &self.patterns {
            patterns.insert(
                label.clone(),
                json!({
                    "signature": p.signature,
                    "count": p.count,
                    "lastSeen": p.last_seen,
                }),
            );
        }
        json!({
            "learnedLabels": self.patterns.keys().collect::<Vec<_>>(),
            "patternCount": self.patterns.len(),
            "patterns": patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learn_creates_then_averages() {
        let mut field = EmergentPatternField::new();
        field.learn("joy", &[1.0, 0.0, 0.0], None);
        assert_eq!(field.get("joy").unwrap().count, 1);

        field.learn("joy", &[0.0, 1.0, 0.0], None);
        let p = field.get("joy").unwrap();
        assert_eq!(p.count, 2);
        // Exact arithmetic mean of the two observations
        assert!((p.signature[0] - 0.5).abs() < 1e-12);
        assert!((p.signature[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_running_mean_matches_batch_mean() {
        let mut field = EmergentPatternField::new();
        let observations = [
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![5.0, 0.0],
            vec![-1.0, 2.0],
        ];
        for obs in &observations {
            field.learn("x", obs, None);
        }
        let p = field.get("x").unwrap();
        assert!((p.signature[0] - 2.0).abs() < 1e-9);
        assert!((p.signature[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_infer_exact_match_is_one() {
        let mut field = EmergentPatternField::new();
        field.learn("joy", &[0.8, 0.1, 0.3], None);
        let result = field.infer(&[0.8, 0.1, 0.3]);
        assert_eq!(result.label.as_deref(), Some("joy"));
        assert!((result.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_infer_miss_keeps_score() {
        let mut field = EmergentPatternField::new();
        field.learn("joy", &[1.0, 0.0], None);
        // Orthogonal probe: similarity 0, below threshold
        let result = field.infer(&[0.0, 1.0]);
        assert_eq!(result.label, None);
        assert!(result.similarity.abs() < 1e-9);
        assert!(!result.is_match());
    }

    #[test]
    fn test_infer_empty_field() {
        let field = EmergentPatternField::new();
        let result = field.infer(&[1.0, 2.0]);
        assert_eq!(result.label, None);
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_adaptive_threshold_monotone_capped() {
        assert_eq!(adaptive_threshold(0), 0.5);
        assert_eq!(adaptive_threshold(1), 0.5);
        let mut prev = 0.5;
        for n in 2..500 {
            let t = adaptive_threshold(n);
            assert!(t >= prev, "threshold dropped at n={n}");
            assert!(t <= 0.95);
            prev = t;
        }
        assert_eq!(adaptive_threshold(100_000), 0.95);
    }

    #[test]
    fn test_example_cap() {
        let mut field = EmergentPatternField::new();
        for i in 0..8 {
            field.learn("x", &[1.0], Some(&format!("example {i}")));
        }
        let p = field.get("x").unwrap();
        assert_eq!(p.examples.len(), EXAMPLE_CAP);
        assert_eq!(p.examples[0], "example 0");
        assert_eq!(p.examples[4], "example 4");
    }

    #[test]
    fn test_pattern_history_fifo() {
        let mut field = EmergentPatternField::new();
        for i in 0..15 {
            field.learn("x", &[i as f64], None);
        }
        let p = field.get("x").unwrap();
        assert_eq!(p.history.len(), PATTERN_HISTORY_CAP);
        // Oldest dropped first: history starts at observation 5
        assert_eq!(p.history[0], vec![5.0]);
        assert_eq!(p.history[9], vec![14.0]);
    }

    #[test]
    fn test_global_history_fifo() {
        let mut field = EmergentPatternField::new();
        for i in 0..60 {
            field.learn(&format!("l{i}"), &[i as f64], None);
        }
        let observations: Vec<&Observation> = field.observations().collect();
        assert_eq!(observations.len(), FIELD_HISTORY_CAP);
        assert_eq!(observations[0].label, "l10");
        assert_eq!(observations[49].label, "l59");
    }

    #[test]
    fn test_restructure_merges_near_duplicates() {
        let mut field = EmergentPatternField::new();
        field.learn("warm", &[1.0, 0.01, 0.0], None);
        field.learn("warm", &[1.0, 0.0, 0.01], None);
        field.learn("warmth", &[1.0, 0.005, 0.005], None);

        let merged = field.restructure();
        let (absorbed, kept) = merged.expect("should merge near-duplicates");
        assert_eq!(kept, "warm"); // higher count wins
        assert_eq!(absorbed, "warmth");
        assert_eq!(field.len(), 1);
        // Counts sum across the merge
        assert_eq!(field.get("warm").unwrap().count, 3);
    }

    #[test]
    fn test_restructure_stops_after_first_merge() {
        let mut field = EmergentPatternField::new();
        field.learn("a", &[1.0, 0.0], None);
        field.learn("b", &[1.0, 1e-6], None);
        field.learn("c", &[1.0, 2e-6], None);

        assert!(field.restructure().is_some());
        assert_eq!(field.len(), 2, "only one merge per invocation");
        assert!(field.restructure().is_some());
        assert_eq!(field.len(), 1);
        assert!(field.restructure().is_none());
    }

    #[test]
    fn test_restructure_distinct_patterns_untouched() {
        let mut field = EmergentPatternField::new();
        field.learn("x", &[1.0, 0.0], None);
        field.learn("y", &[0.0, 1.0], None);
        assert!(field.restructure().is_none());
        assert_eq!(field.len(), 2);
    }

    #[test]
    fn test_forget() {
        let mut field = EmergentPatternField::new();
        field.learn("x", &[1.0], None);
        assert!(field.forget("x"));
        assert!(!field.forget("x"));
        assert!(field.is_empty());
    }

    #[test]
    fn test_decay_halves_then_drops() {
        let mut field = EmergentPatternField::new();
        field.learn("old", &[1.0], None);
        let seen = field.get("old").unwrap().last_seen;

        field.decay(seen + 100, 1000);
        assert_eq!(field.get("old").unwrap().count, 1, "fresh pattern untouched");

        field.decay(seen + 2000, 1000);
        assert!(field.get("old").is_none(), "count 1 halves to 0 and drops");
    }

    #[test]
    fn test_to_json_contract() {
        let mut field = EmergentPatternField::new();
        field.learn("joy", &[1.0, 0.5], None);
        field.learn("fear", &[0.0, 1.0], None);

        let v = field.to_json();
        assert_eq!(v["patternCount"], 2);
        let labels = v["learnedLabels"].as_array().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(v["patterns"]["joy"]["count"], 1);
        assert_eq!(v["patterns"]["joy"]["signature"][0], 1.0);
        assert!(v["patterns"]["joy"]["lastSeen"].as_u64().is_some());
    }
}

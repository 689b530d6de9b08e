//! Discrete variant of the pattern field for relation/connector types.
//!
//! Signatures are six-slot ternary spins (one slot per default channel)
//! instead of continuous vectors. Updates collapse toward consistency
//! rather than averaging; inference reuses the continuous cosine machinery
//! through a derived weight view.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::now_unix_secs;
use crate::constants::{FIELD_HISTORY_CAP, SPIN_SLOTS};
use crate::field::{Inference, Observation, adaptive_threshold, cosine_similarity};

/// Ternary spin with values −0.5 / 0 / +0.5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Spin {
    Down,
    #[default]
    Neutral,
    Up,
}

impl Spin {
    /// Raw spin value: −0.5, 0, or +0.5.
    pub fn value(self) -> f64 {
        match self {
            Spin::Down => -0.5,
            Spin::Neutral => 0.0,
            Spin::Up => 0.5,
        }
    }

    /// Continuous interop weight: −0.5→0, 0→0.5, +0.5→1.
    pub fn weight(self) -> f64 {
        self.value() + 0.5
    }

    pub fn from_value(v: f64) -> Self {
        if v > 0.25 {
            Spin::Up
        } else if v < -0.25 {
            Spin::Down
        } else {
            Spin::Neutral
        }
    }

    /// Consistency collapse against a new observation: agreement keeps the
    /// slot, a neutral slot adopts the observation, and an up/down conflict
    /// collapses to neutral.
    pub fn collapse(self, observed: Spin) -> Spin {
        match (self, observed) {
            (a, b) if a == b => a,
            (Spin::Neutral, b) => b,
            (a, Spin::Neutral) => a,
            _ => Spin::Neutral,
        }
    }
}

/// Six-slot spin signature, one slot per default channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpinSignature(pub [Spin; SPIN_SLOTS]);

impl SpinSignature {
    pub fn new(slots: [Spin; SPIN_SLOTS]) -> Self {
        Self(slots)
    }

    /// Build from raw spin values (−0.5/0/+0.5); missing slots are neutral.
    pub fn from_values(values: &[f64]) -> Self {
        let mut slots = [Spin::Neutral; SPIN_SLOTS];
        for (slot, v) in slots.iter_mut().zip(values.iter()) {
            *slot = Spin::from_value(*v);
        }
        Self(slots)
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.iter().map(|s| s.value()).collect()
    }

    /// Continuous view for similarity/inference code expecting vectors.
    pub fn weights(&self) -> Vec<f64> {
        self.0.iter().map(|s| s.weight()).collect()
    }

    pub fn collapse(&mut self, observed: &SpinSignature) {
        for (slot, obs) in self.0.iter_mut().zip(observed.0.iter()) {
            *slot = slot.collapse(*obs);
        }
    }
}

/// A learned connector type: label plus collapsed spin signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectorPattern {
    pub label: String,
    pub spins: SpinSignature,
    pub count: u32,
    pub last_seen: u64,
}

/// Online learner over spin signatures, sharing the adaptive-threshold and
/// cosine conventions of the continuous field.
#[derive(Clone, Debug, Default)]
pub struct ConnectorField {
    patterns: BTreeMap<String, ConnectorPattern>,
    history: VecDeque<Observation>,
}

impl ConnectorField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn one observation: a known label collapses slot-by-slot toward
    /// consistency with what was seen; an unknown label stores it verbatim.
    pub fn learn(&mut self, label: &str, observed: &SpinSignature) {
        let now = now_unix_secs();

        match self.patterns.get_mut(label) {
            Some(pattern) => {
                pattern.spins.collapse(observed);
                pattern.count += 1;
                pattern.last_seen = now;
            }
            None => {
                self.patterns.insert(
                    label.to_string(),
                    ConnectorPattern {
                        label: label.to_string(),
                        spins: *observed,
                        count: 1,
                        last_seen: now,
                    },
                );
            }
        }

        self.history.push_back(Observation {
            label: label.to_string(),
            signature: observed.values(),
            at: now,
        });
        while self.history.len() > FIELD_HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// Infer from a spin signature via its continuous weight view.
    pub fn infer(&self, observed: &SpinSignature) -> Inference {
        self.infer_weights(&observed.weights())
    }

    /// Infer from an already-continuous weight vector.
    pub fn infer_weights(&self, weights: &[f64]) -> Inference {
        let mut best_label: Option<&str> = None;
        let mut best_similarity = f64::NEG_INFINITY;

        for (label, pattern) in &self.patterns {
            let similarity = cosine_similarity(weights, &pattern.spins.weights());
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

    pub fn forget(&mut self, label: &str) -> bool {
        self.patterns.remove(label).is_some()
    }

    pub fn get(&self, label: &str) -> Option<&ConnectorPattern> {
        self.patterns.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(|k| k.as_str())
    }

    pub fn patterns(&self) -> impl Iterator<Item = &ConnectorPattern> {
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

    pub(crate) fn restore(patterns: Vec<ConnectorPattern>, history: Vec<Observation>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| (p.label.clone(), p)).collect(),
            history: history.into(),
        }
    }

    /// Query-contract summary, with the continuous weight view as signature.
    pub fn to_json(&self) -> Value {
        let mut patterns = serde_json::Map::new();
        for (label, p) in &self.patterns {
            patterns.insert(
                label.clone(),
                json!({
                    "signature": p.spins.weights(),
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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::complex::{Complex, ZERO};

/// Sparse complex-valued vector keyed by string id.
///
/// Keys are unique and sorted; insertion order carries no meaning.
/// Serializes as `{ id: {re, im}, ... }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Waveform {
    amplitudes: BTreeMap<String, Complex>,
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: impl Into<String>, amplitude: Complex) {
        self.amplitudes.insert(id.into(), amplitude);
    }

    /// Amplitude for an id, zero when absent.
    pub fn get(&self, id: &str) -> Complex {
        self.amplitudes.get(id).copied().unwrap_or(ZERO)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.amplitudes.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Complex> {
        self.amplitudes.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.amplitudes.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Complex)> {
        self.amplitudes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Sum of squared magnitudes over all entries.
    pub fn total_magnitude_sq(&self) -> f64 {
        self.amplitudes.values().map(|a| a.magnitude_sq()).sum()
    }

    /// Scale every component by 1/√S so that Σ|amp|² = 1.
    /// A zero-magnitude waveform is left unchanged.
    pub fn normalize(&mut self) {
        let total = self.total_magnitude_sq();
        if total <= 0.0 {
            return;
        }
        let inv = 1.0 / total.sqrt();
        for amp in self.amplitudes.values_mut() {
            *amp = amp.scale(inv);
        }
    }

    /// Inner product ⟨self|other⟩ = Σ self(id)·conj(other(id)) over shared ids.
    pub fn inner_product(&self, other: &Waveform) -> Complex {
        let mut sum = ZERO;
        for (id, amp) in &self.amplitudes {
            if let Some(b) = other.amplitudes.get(id) {
                sum = sum.add(amp.mul(b.conj()));
            }
        }
        sum
    }

    /// Union of the ids present in either waveform, sorted.
    pub fn union_ids(&self, other: &Waveform) -> Vec<String> {
        let mut ids: Vec<String> = self.amplitudes.keys().cloned().collect();
        for id in other.amplitudes.keys() {
            if !self.amplitudes.contains_key(id) {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }
}

use serde::{Deserialize, Serialize};

use crate::channels::MultiChannelWaveform;
use crate::complex::Complex;

/// A pure transformation of a multi-channel waveform.
///
/// Every gate returns a new container; the input is never mutated. Gates
/// compose into fixed-order pipelines via [`GateSequence`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Gate {
    /// Exchange two channels' waveforms wholesale.
    Swap { a: String, b: String },
    /// Multiply every amplitude in the channel by e^{iθ}.
    Phase { channel: String, theta: f64 },
    /// Pairwise superposition mix over the union of ids:
    /// a' = (a+b)/√2, b' = (a−b)/√2. Output is not re-normalized;
    /// applying twice restores the pair up to floating error.
    Hadamard { a: String, b: String },
    /// Multiply every amplitude in the channel by a real factor.
    Scale { channel: String, factor: f64 },
    /// Apply the inner gate only when the control channel's total squared
    /// magnitude exceeds the threshold; identity otherwise.
    Controlled {
        control: String,
        threshold: f64,
        gate: Box<Gate>,
    },
    /// Move `fraction` of each source amplitude into the destination
    /// channel. The source keeps 1−fraction; the destination accumulates by
    /// complex addition, starting from zero for unseen ids.
    Transfer {
        from: String,
        to: String,
        fraction: f64,
    },
}

impl Gate {
    pub fn apply(&self, input: &MultiChannelWaveform) -> MultiChannelWaveform {
        let mut out = input.clone();
        match self {
            Gate::Swap { a, b } => {
                let wave_a = out.channel_mut(a).clone();
                let wave_b = out.channel_mut(b).clone();
                out.set_channel(a.clone(), wave_b);
                out.set_channel(b.clone(), wave_a);
            }
            Gate::Phase { channel, theta } => {
                let rotor = Complex::from_phase(*theta);
                let wave = out.channel_mut(channel);
                let ids: Vec<String> = wave.ids().map(String::from).collect();
                for id in ids {
                    let amp = wave.get(&id);
                    wave.set(id, amp.mul(rotor));
                }
            }
            Gate::Hadamard { a, b } => {
                let wave_a = out.channel_mut(a).clone();
                let wave_b = out.channel_mut(b).clone();
                let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;

                let mut new_a = wave_a.clone();
                let mut new_b = wave_b.clone();
                for id in wave_a.union_ids(&wave_b) {
                    let x = wave_a.get(&id);
                    let y = wave_b.get(&id);
                    new_a.set(id.clone(), x.add(y).scale(inv_sqrt2));
                    new_b.set(id, x.sub(y).scale(inv_sqrt2));
                }
                out.set_channel(a.clone(), new_a);
                out.set_channel(b.clone(), new_b);
            }
            Gate::Scale { channel, factor } => {
                let wave = out.channel_mut(channel);
                let ids: Vec<String> = wave.ids().map(String::from).collect();
                for id in ids {
                    let amp = wave.get(&id);
                    wave.set(id, amp.scale(*factor));
                }
            }
            Gate::Controlled {
                control,
                threshold,
                gate,
            } => {
                if input.energy(control) > *threshold {
                    return gate.apply(input);
                }
            }
            Gate::Transfer { from, to, fraction } => {
                let source = out.channel_mut(from).clone();
                for (id, amp) in source.iter() {
                    let moved = amp.scale(*fraction);
                    out.channel_mut(from).set(id, amp.scale(1.0 - fraction));
                    let existing = out.channel_mut(to).get(id);
                    out.channel_mut(to).set(id, existing.add(moved));
                }
            }
        }
        out
    }

    /// Chain this gate with another into a sequence.
    pub fn then(self, next: Gate) -> GateSequence {
        GateSequence {
            gates: vec![self, next],
        }
    }
}

/// A fixed-order gate pipeline. Application is left to right; composition
/// is associative in effect but generally not commutative.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateSequence {
    gates: Vec<Gate>,
}

impl GateSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn apply(&self, input: &MultiChannelWaveform) -> MultiChannelWaveform {
        let mut current = input.clone();
        for gate in &self.gates {
            current = gate.apply(&current);
        }
        current
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }
}

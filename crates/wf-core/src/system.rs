use serde_json::Value;
use uuid::Uuid;

use crate::channels::MultiChannelWaveform;
use crate::complex::Complex;
use crate::field::EmergentPatternField;
use crate::gates::GateSequence;
use crate::graph::{AboutnessGraph, GraphError, Mode};
use crate::spin::ConnectorField;
use crate::symmetry::SymmetryQueryEngine;

/// Per-channel energy summary for stats output.
#[derive(Clone, Debug)]
pub struct ChannelEnergy {
    pub channel: String,
    pub energy: f64,
    /// Id with the largest squared magnitude, if the channel is non-empty.
    pub dominant: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SystemStats {
    pub occurrences: usize,
    pub relations: usize,
    pub emotion_patterns: usize,
    pub connector_patterns: usize,
    pub cached_paths: usize,
    pub channels: Vec<ChannelEnergy>,
}

/// Top-level container wiring the substrate together: one attention
/// container, one event graph, the two pattern fields, and the symmetry
/// engine. Construction is always explicit — instances are owned by their
/// caller and never shared implicitly.
pub struct WavefieldSystem {
    pub agent_name: String,
    pub attention: MultiChannelWaveform,
    pub graph: AboutnessGraph,
    pub emotions: EmergentPatternField,
    pub connectors: ConnectorField,
    pub symmetry: SymmetryQueryEngine,
}

impl WavefieldSystem {
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            attention: MultiChannelWaveform::new(),
            graph: AboutnessGraph::new(),
            emotions: EmergentPatternField::new(),
            connectors: ConnectorField::new(),
            symmetry: SymmetryQueryEngine::new(),
        }
    }

    /// Channel that receives seed amplitude for a mode.
    fn mode_channel(mode: Mode) -> &'static str {
        match mode {
            Mode::Unity => "up",
            Mode::Duality => "down",
            Mode::Relation => "charm",
        }
    }

    /// Register an event: add an occurrence to the graph and seed a unit
    /// amplitude for its id into the channel matching its mode. The channel
    /// is left un-normalized; callers decide when to renormalize.
    pub fn observe(&mut self, mode: Mode, payload: Value) -> Uuid {
        let id = self.graph.add_occurrence(mode, payload);
        self.attention
            .channel_mut(Self::mode_channel(mode))
            .set(id.to_string(), Complex::one());
        id
    }

    pub fn relate(&mut self, from: Uuid, to: Uuid, weight: f64) -> Result<usize, GraphError> {
        self.graph.add_relation(from, to, weight, Value::Null)
    }

    /// Remove an event and its amplitude from every channel.
    pub fn forget_occurrence(&mut self, id: Uuid) -> bool {
        if !self.graph.remove_occurrence(id) {
            return false;
        }
        let key = id.to_string();
        let names: Vec<String> = self.attention.channel_names().map(String::from).collect();
        for name in names {
            self.attention.channel_mut(&name).remove(&key);
        }
        true
    }

    /// Run a gate pipeline over the owned attention container.
    pub fn apply(&mut self, sequence: &GateSequence) {
        self.attention = sequence.apply(&self.attention);
    }

    pub fn stats(&self) -> SystemStats {
        let channels = self
            .attention
            .iter()
            .map(|(name, wave)| {
                let dominant = wave
                    .iter()
                    .max_by(|a, b| {
                        a.1.magnitude_sq()
                            .partial_cmp(&b.1.magnitude_sq())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(id, _)| id.to_string());
                ChannelEnergy {
                    channel: name.to_string(),
                    energy: wave.total_magnitude_sq(),
                    dominant,
                }
            })
            .collect();

        SystemStats {
            occurrences: self.graph.occurrence_count(),
            relations: self.graph.relation_count(),
            emotion_patterns: self.emotions.len(),
            connector_patterns: self.connectors.len(),
            cached_paths: self.symmetry.path_count(),
            channels,
        }
    }
}

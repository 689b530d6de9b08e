//! JSON serde for the versioned wire format.
//!
//! The wire format uses camelCase field names, stores amplitudes as
//! `{re, im}` objects keyed by id, spin signatures as raw value arrays,
//! and symmetry paths as `{startId, endId, steps}` objects. Parsing is
//! tolerant: unparseable occurrence ids are regenerated, and relations
//! with unresolvable endpoints are skipped with a warning.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::channels::MultiChannelWaveform;
use crate::clock::now_unix_secs;
use crate::field::{EmergentPatternField, Observation, Pattern};
use crate::graph::{Mode, Occurrence};
use crate::spin::{ConnectorField, ConnectorPattern, SpinSignature};
use crate::symmetry::{SymmetryPath, SymmetryQueryEngine, SymmetryStep, TransformationRecord};
use crate::system::WavefieldSystem;

pub const CURRENT_VERSION: &str = "0.3.1";

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireExport {
    pub version: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(rename = "agentName", default)]
    pub agent_name: String,
    #[serde(default)]
    pub attention: MultiChannelWaveform,
    #[serde(default)]
    pub graph: WireGraph,
    #[serde(default)]
    pub emotions: WireField,
    #[serde(default)]
    pub connectors: WireConnectorField,
    #[serde(default)]
    pub symmetry: WireSymmetry,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WireGraph {
    pub occurrences: Vec<WireOccurrence>,
    pub relations: Vec<WireRelation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireOccurrence {
    pub id: String,
    #[serde(default)]
    pub mode: String,
    pub payload: Value,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireRelation {
    pub from: String,
    pub to: String,
    pub weight: f64,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WireField {
    pub patterns: Vec<WirePattern>,
    #[serde(default)]
    pub history: Vec<WireObservation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WirePattern {
    pub label: String,
    pub signature: Vec<f64>,
    pub count: u32,
    #[serde(rename = "lastSeen", default)]
    pub last_seen: u64,
    #[serde(default)]
    pub history: Vec<Vec<f64>>,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireObservation {
    pub label: String,
    pub signature: Vec<f64>,
    #[serde(default)]
    pub at: u64,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WireConnectorField {
    pub patterns: Vec<WireConnectorPattern>,
    #[serde(default)]
    pub history: Vec<WireObservation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireConnectorPattern {
    pub label: String,
    /// Raw spin values, −0.5/0/+0.5 per slot.
    pub spins: Vec<f64>,
    pub count: u32,
    #[serde(rename = "lastSeen", default)]
    pub last_seen: u64,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WireSymmetry {
    pub paths: Vec<WireSymmetryPath>,
    #[serde(default)]
    pub history: Vec<WireTransformation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireSymmetryPath {
    #[serde(rename = "startId")]
    pub start: String,
    #[serde(rename = "endId")]
    pub end: String,
    pub steps: Vec<WireStep>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireStep {
    pub operator: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(rename = "timestamp", default)]
    pub at: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireTransformation {
    #[serde(rename = "startId")]
    pub start: String,
    #[serde(rename = "endId")]
    pub end: String,
    pub operators: Vec<String>,
    #[serde(default)]
    pub at: u64,
}

// --- Conversion: Domain → Wire ---

impl WireExport {
    pub fn from_system(system: &WavefieldSystem) -> Self {
        let graph = WireGraph {
            occurrences: system
                .graph
                .occurrence_ids()
                .filter_map(|id| system.graph.get(id))
                .map(|occ| WireOccurrence {
                    id: occ.id.to_string(),
                    mode: occ.mode.as_str().to_string(),
                    payload: occ.payload.clone(),
                    metadata: occ.metadata.clone(),
                })
                .collect(),
            relations: system
                .graph
                .relations()
                .map(|rel| WireRelation {
                    from: rel.from.to_string(),
                    to: rel.to.to_string(),
                    weight: rel.weight,
                    metadata: rel.metadata.clone(),
                })
                .collect(),
        };

        let emotions = WireField {
            patterns: system
                .emotions
                .patterns()
                .map(|p| WirePattern {
                    label: p.label.clone(),
                    signature: p.signature.clone(),
                    count: p.count,
                    last_seen: p.last_seen,
                    history: p.history.clone(),
                    examples: p.examples.clone(),
                })
                .collect(),
            history: system.emotions.observations().map(wire_observation).collect(),
        };

        let connectors = WireConnectorField {
            patterns: system
                .connectors
                .patterns()
                .map(|p| WireConnectorPattern {
                    label: p.label.clone(),
                    spins: p.spins.values(),
                    count: p.count,
                    last_seen: p.last_seen,
                })
                .collect(),
            history: system
                .connectors
                .observations()
                .map(wire_observation)
                .collect(),
        };

        let symmetry = WireSymmetry {
            paths: {
                let mut paths: Vec<&SymmetryPath> = system.symmetry.paths().collect();
                paths.sort_by(|a, b| (&a.start, &a.end).cmp(&(&b.start, &b.end)));
                paths
                    .into_iter()
                    .map(|p| WireSymmetryPath {
                        start: p.start.clone(),
                        end: p.end.clone(),
                        steps: p
                            .steps
                            .iter()
                            .map(|s| WireStep {
                                operator: s.operator.clone(),
                                params: s.params.clone(),
                                delta: s.delta,
                                at: s.at,
                            })
                            .collect(),
                    })
                    .collect()
            },
            history: system
                .symmetry
                .history()
                .map(|r| WireTransformation {
                    start: r.start.clone(),
                    end: r.end.clone(),
                    operators: r.operators.clone(),
                    at: r.at,
                })
                .collect(),
        };

        WireExport {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_unix_secs(),
            agent_name: system.agent_name.clone(),
            attention: system.attention.clone(),
            graph,
            emotions,
            connectors,
            symmetry,
        }
    }

    // --- Conversion: Wire → Domain ---

    pub fn into_system(self) -> WavefieldSystem {
        let mut system = WavefieldSystem::new(&self.agent_name);
        system.attention = self.attention;

        // Occurrences first; remember how each wire id resolved so that
        // relations still connect when an id had to be regenerated.
        let mut resolved: HashMap<String, Uuid> = HashMap::new();
        for wire in self.graph.occurrences {
            let mut occ = Occurrence::new(Mode::from_str_lossy(&wire.mode), wire.payload);
            if let Ok(id) = Uuid::parse_str(&wire.id) {
                occ.id = id;
            }
            occ.metadata = wire.metadata;
            resolved.insert(wire.id, occ.id);
            system.graph.insert(occ);
        }

        for wire in self.graph.relations {
            let (Some(&from), Some(&to)) = (resolved.get(&wire.from), resolved.get(&wire.to))
            else {
                tracing::warn!("skipping relation with unknown endpoint {} -> {}", wire.from, wire.to);
                continue;
            };
            if let Err(e) = system.graph.add_relation(from, to, wire.weight, wire.metadata) {
                tracing::warn!("skipping invalid relation: {e}");
            }
        }

        system.emotions = EmergentPatternField::restore(
            self.emotions
                .patterns
                .into_iter()
                .map(|p| Pattern {
                    label: p.label,
                    signature: p.signature,
                    count: p.count,
                    last_seen: p.last_seen,
                    history: p.history,
                    examples: p.examples,
                })
                .collect(),
            self.emotions.history.into_iter().map(observation).collect(),
        );

        system.connectors = ConnectorField::restore(
            self.connectors
                .patterns
                .into_iter()
                .map(|p| ConnectorPattern {
                    label: p.label,
                    spins: SpinSignature::from_values(&p.spins),
                    count: p.count,
                    last_seen: p.last_seen,
                })
                .collect(),
            self.connectors.history.into_iter().map(observation).collect(),
        );

        system.symmetry = SymmetryQueryEngine::restore(
            self.symmetry
                .paths
                .into_iter()
                .map(|p| SymmetryPath {
                    start: p.start,
                    end: p.end,
                    steps: p
                        .steps
                        .into_iter()
                        .map(|s| SymmetryStep {
                            operator: s.operator,
                            params: s.params,
                            delta: s.delta,
                            at: s.at,
                        })
                        .collect(),
                })
                .collect(),
            self.symmetry
                .history
                .into_iter()
                .map(|r| TransformationRecord {
                    start: r.start,
                    end: r.end,
                    operators: r.operators,
                    at: r.at,
                })
                .collect(),
        );

        system
    }
}

fn wire_observation(obs: &Observation) -> WireObservation {
    WireObservation {
        label: obs.label.clone(),
        signature: obs.signature.clone(),
        at: obs.at,
    }
}

fn observation(wire: WireObservation) -> Observation {
    Observation {
        label: wire.label,
        signature: wire.signature,
        at: wire.at,
    }
}

/// Serialize a system to the versioned JSON wire format.
pub fn export_json(system: &WavefieldSystem) -> Result<String, serde_json::Error> {
    let wire = WireExport::from_system(system);
    serde_json::to_string_pretty(&wire)
}

/// Deserialize a JSON export into a system.
pub fn import_json(json: &str) -> Result<WavefieldSystem, serde_json::Error> {
    let wire: WireExport = serde_json::from_str(json)?;
    Ok(wire.into_system())
}

//! Waveform attention substrate.
//!
//! Models an agent's attention as a complex-valued, multi-channel waveform
//! over a directed graph of discrete events. On top of the waveform algebra
//! sit gate pipelines, an equivalence-class state space with curvature
//! geometry, two online pattern fields (continuous emotions, ternary
//! connectors), and a symmetry engine that records, composes, and inverts
//! chains of named operators between labels.
//!
//! Zero I/O — pure math engine with no opinions about transport or
//! persistence. Single-threaded by design; every bounded buffer evicts
//! strictly oldest-first.

pub mod channels;
pub mod clock;
pub mod complex;
pub mod constants;
pub mod field;
pub mod gates;
pub mod geometry;
pub mod graph;
pub mod serde_compat;
pub mod spin;
pub mod state;
pub mod symmetry;
pub mod system;
pub mod waveform;

pub use channels::MultiChannelWaveform;
pub use complex::Complex;
pub use constants::{DEFAULT_CHANNELS, EPSILON};
pub use field::{
    EmergentPatternField, Inference, Observation, Pattern, adaptive_threshold, cosine_similarity,
};
pub use gates::{Gate, GateSequence};
pub use geometry::{
    CollapseRegion, curvature_profile, identify_collapse_regions, loops_through,
    shortest_path_len, simple_paths, state_curvature,
};
pub use graph::{AboutnessGraph, AboutnessRelation, GraphError, Mode, Occurrence};
pub use serde_compat::{CURRENT_VERSION, export_json, import_json};
pub use spin::{ConnectorField, ConnectorPattern, Spin, SpinSignature};
pub use state::{State, StateSpace};
pub use symmetry::{
    ReplayPlan, ScoredPath, SymmetryPath, SymmetryQueryEngine, SymmetryStep, WalkBack,
    inverse_operator,
};
pub use system::{SystemStats, WavefieldSystem};
pub use waveform::Waveform;

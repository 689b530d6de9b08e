/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Default channel names. Channels, connector spin slots, and symmetry
/// operator tags share this six-flavor vocabulary.
pub const DEFAULT_CHANNELS: [&str; 6] = ["up", "down", "charm", "strange", "top", "bottom"];

/// Number of spin slots in a connector signature — one per default channel
pub const SPIN_SLOTS: usize = 6;

/// Base similarity threshold when a field holds at most one pattern
pub const BASE_THRESHOLD: f64 = 0.5;

/// Ceiling for the adaptive similarity threshold
pub const THRESHOLD_CEILING: f64 = 0.95;

/// Cosine similarity above which restructure() merges two patterns
pub const MERGE_THRESHOLD: f64 = 0.95;

/// Per-pattern rolling history of raw signatures
pub const PATTERN_HISTORY_CAP: usize = 10;

/// Per-pattern stored example strings
pub const EXAMPLE_CAP: usize = 5;

/// Field-wide raw observation history
pub const FIELD_HISTORY_CAP: usize = 50;

/// Symmetry engine transformation history
pub const TRANSFORM_HISTORY_CAP: usize = 200;

/// BFS depth cap for indirect path discovery in the symmetry engine
pub const PATH_SEARCH_DEPTH: usize = 3;

/// DFS depth cap for simple-path enumeration over the event graph
pub const SIMPLE_PATH_DEPTH: usize = 6;

/// Default step cap for provenance walks
pub const WALK_BACK_STEPS: usize = 10;

/// Overlap floor for operator-signature queries
pub const SIGNATURE_OVERLAP_FLOOR: f64 = 0.5;

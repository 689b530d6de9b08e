use std::collections::HashMap;

use uuid::Uuid;

use crate::graph::AboutnessGraph;

/// Equivalence class of occurrences sharing an identical payload
/// (optionally also the same mode).
#[derive(Clone, Debug)]
pub struct State {
    pub id: usize,
    pub key: String,
    pub occurrences: Vec<Uuid>,
}

/// Occurrence → state grouping, built deterministically from a graph.
#[derive(Clone, Debug, Default)]
pub struct StateSpace {
    states: Vec<State>,
    occurrence_to_state: HashMap<Uuid, usize>,
}

impl StateSpace {
    /// Group occurrences by canonical payload key, walking the graph in
    /// insertion order so state ids are assigned first-seen.
    pub fn from_graph(graph: &AboutnessGraph, mode_sensitive: bool) -> Self {
        let mut space = Self::default();
        let mut key_to_state: HashMap<String, usize> = HashMap::new();

        for id in graph.occurrence_ids() {
            let Some(occ) = graph.get(id) else { continue };
            let key = if mode_sensitive {
                format!("{}|{}", occ.payload_key(), occ.mode.as_str())
            } else {
                occ.payload_key()
            };

            let state_id = *key_to_state.entry(key.clone()).or_insert_with(|| {
                let state_id = space.states.len();
                space.states.push(State {
                    id: state_id,
                    key,
                    occurrences: Vec::new(),
                });
                state_id
            });
            space.states[state_id].occurrences.push(id);
            space.occurrence_to_state.insert(id, state_id);
        }

        space
    }

    pub fn state_of(&self, occurrence: Uuid) -> Option<usize> {
        self.occurrence_to_state.get(&occurrence).copied()
    }

    pub fn state(&self, id: usize) -> Option<&State> {
        self.states.get(id)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Mode;
    use serde_json::json;

    #[test]
    fn test_grouping_by_payload() {
        let mut g = AboutnessGraph::new();
        let a = g.add_occurrence(Mode::Unity, json!("cat"));
        let b = g.add_occurrence(Mode::Unity, json!("dog"));
        let c = g.add_occurrence(Mode::Duality, json!("cat"));

        let space = StateSpace::from_graph(&g, false);
        assert_eq!(space.len(), 2);
        assert_eq!(space.state_of(a), space.state_of(c));
        assert_ne!(space.state_of(a), space.state_of(b));
    }

    #[test]
    fn test_mode_sensitive_splits_states() {
        let mut g = AboutnessGraph::new();
        let a = g.add_occurrence(Mode::Unity, json!("cat"));
        let c = g.add_occurrence(Mode::Duality, json!("cat"));

        let space = StateSpace::from_graph(&g, true);
        assert_eq!(space.len(), 2);
        assert_ne!(space.state_of(a), space.state_of(c));
    }

    #[test]
    fn test_first_seen_id_assignment() {
        let mut g = AboutnessGraph::new();
        g.add_occurrence(Mode::Unity, json!("first"));
        g.add_occurrence(Mode::Unity, json!("second"));
        g.add_occurrence(Mode::Unity, json!("first"));

        let space = StateSpace::from_graph(&g, false);
        assert_eq!(space.state(0).unwrap().key, "\"first\"");
        assert_eq!(space.state(1).unwrap().key, "\"second\"");
        assert_eq!(space.state(0).unwrap().occurrences.len(), 2);
    }

    #[test]
    fn test_structural_payload_equality() {
        let mut g = AboutnessGraph::new();
        let a = g.add_occurrence(Mode::Unity, json!({ "x": 1, "y": [1, 2] }));
        let b = g.add_occurrence(Mode::Unity, json!({ "y": [1, 2], "x": 1 }));

        let space = StateSpace::from_graph(&g, false);
        assert_eq!(space.state_of(a), space.state_of(b));
    }

    #[test]
    fn test_empty_graph() {
        let g = AboutnessGraph::new();
        let space = StateSpace::from_graph(&g, false);
        assert!(space.is_empty());
        assert_eq!(space.state_of(Uuid::new_v4()), None);
    }
}

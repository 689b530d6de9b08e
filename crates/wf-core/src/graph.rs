use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How an occurrence presents itself: a bare unity, a split, or a bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Unity,
    Duality,
    Relation,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unity => "unity",
            Self::Duality => "duality",
            Self::Relation => "relation",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "duality" => Self::Duality,
            "relation" => Self::Relation,
            _ => Self::Unity,
        }
    }
}

#[derive(Debug)]
pub enum GraphError {
    MissingEndpoint(Uuid),
    SelfReference(Uuid),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::MissingEndpoint(id) => write!(f, "no occurrence with id {id}"),
            GraphError::SelfReference(id) => {
                write!(f, "relation from {id} to itself is not allowed")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// A discrete event node. The payload is opaque and compared only through
/// its canonical serialization; metadata is the one mutable part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Uuid,
    pub mode: Mode,
    pub payload: Value,
    pub metadata: Value,
}

impl Occurrence {
    pub fn new(mode: Mode, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            payload,
            metadata: Value::Null,
        }
    }

    /// Canonical grouping key for the payload. serde_json's default map
    /// keeps object keys sorted, so `to_string` is already order-stable.
    pub fn payload_key(&self) -> String {
        self.payload.to_string()
    }
}

/// A directed, non-reflexive "is about" edge between occurrences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AboutnessRelation {
    pub from: Uuid,
    pub to: Uuid,
    pub weight: f64,
    pub metadata: Value,
}

impl AboutnessRelation {
    /// Fails when from == to; self-reference is never representable.
    pub fn new(from: Uuid, to: Uuid, weight: f64) -> Result<Self, GraphError> {
        if from == to {
            return Err(GraphError::SelfReference(from));
        }
        Ok(Self {
            from,
            to,
            weight,
            metadata: Value::Null,
        })
    }
}

/// Directed event graph: occurrences plus an arena of relations addressed by
/// stable index. Adjacency lists hold arena indices, so removal and
/// iteration order stay well-defined.
#[derive(Debug, Default)]
pub struct AboutnessGraph {
    occurrences: HashMap<Uuid, Occurrence>,
    /// Insertion order of occurrence ids; drives deterministic state building.
    order: Vec<Uuid>,
    relations: Vec<Option<AboutnessRelation>>,
    outgoing: HashMap<Uuid, Vec<usize>>,
    incoming: HashMap<Uuid, Vec<usize>>,
}

impl AboutnessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_occurrence(&mut self, mode: Mode, payload: Value) -> Uuid {
        self.insert(Occurrence::new(mode, payload))
    }

    pub fn insert(&mut self, occurrence: Occurrence) -> Uuid {
        let id = occurrence.id;
        if self.occurrences.insert(id, occurrence).is_none() {
            self.order.push(id);
        }
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&Occurrence> {
        self.occurrences.get(&id)
    }

    /// Metadata is the only mutable part of a stored occurrence.
    pub fn set_metadata(&mut self, id: Uuid, metadata: Value) -> bool {
        match self.occurrences.get_mut(&id) {
            Some(occ) => {
                occ.metadata = metadata;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.occurrences.contains_key(&id)
    }

    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }

    /// Occurrence ids in insertion order.
    pub fn occurrence_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.order.iter().copied()
    }

    /// Validates both endpoints and non-reflexivity, then stores the
    /// relation in the arena and indexes it on both adjacency sides.
    pub fn add_relation(
        &mut self,
        from: Uuid,
        to: Uuid,
        weight: f64,
        metadata: Value,
    ) -> Result<usize, GraphError> {
        if !self.contains(from) {
            return Err(GraphError::MissingEndpoint(from));
        }
        if !self.contains(to) {
            return Err(GraphError::MissingEndpoint(to));
        }
        let mut relation = AboutnessRelation::new(from, to, weight)?;
        relation.metadata = metadata;

        let index = self.relations.len();
        self.relations.push(Some(relation));
        self.outgoing.entry(from).or_default().push(index);
        self.incoming.entry(to).or_default().push(index);
        Ok(index)
    }

    pub fn relation(&self, index: usize) -> Option<&AboutnessRelation> {
        self.relations.get(index).and_then(|slot| slot.as_ref())
    }

    /// Live relations (arena slots still occupied).
    pub fn relations(&self) -> impl Iterator<Item = &AboutnessRelation> {
        self.relations.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn relation_count(&self) -> usize {
        self.relations.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn remove_relation(&mut self, index: usize) -> Option<AboutnessRelation> {
        let relation = self.relations.get_mut(index)?.take()?;
        if let Some(list) = self.outgoing.get_mut(&relation.from) {
            list.retain(|&i| i != index);
        }
        if let Some(list) = self.incoming.get_mut(&relation.to) {
            list.retain(|&i| i != index);
        }
        Some(relation)
    }

    /// Remove an occurrence and every relation touching it, on both
    /// adjacency sides, before the node itself goes away.
    pub fn remove_occurrence(&mut self, id: Uuid) -> bool {
        if !self.contains(id) {
            return false;
        }

        let mut incident: Vec<usize> = Vec::new();
        incident.extend(self.outgoing.get(&id).into_iter().flatten());
        incident.extend(self.incoming.get(&id).into_iter().flatten());
        incident.sort_unstable();
        incident.dedup();

        for index in incident {
            self.remove_relation(index);
        }

        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        self.occurrences.remove(&id);
        self.order.retain(|&o| o != id);
        true
    }

    /// Outgoing relations of a node, in arena-index order.
    pub fn outgoing(&self, id: Uuid) -> impl Iterator<Item = &AboutnessRelation> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.relation(i))
    }

    pub fn incoming(&self, id: Uuid) -> impl Iterator<Item = &AboutnessRelation> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.relation(i))
    }

    pub fn successors(&self, id: Uuid) -> Vec<Uuid> {
        self.outgoing(id).map(|r| r.to).collect()
    }
}

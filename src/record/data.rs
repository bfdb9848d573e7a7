//! Attribute and relationship storage for one record.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::document::Links;
use crate::identifier::Lid;

/// Resolved relationship linkage, by lid.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationshipData {
    One(Option<Lid>),
    Many(Vec<Lid>),
}

impl RelationshipData {
    pub fn lids(&self) -> Vec<&Lid> {
        match self {
            RelationshipData::One(lid) => lid.iter().collect(),
            RelationshipData::Many(lids) => lids.iter().collect(),
        }
    }
}

/// What is known about one relationship. `data: None` means the linkage is
/// unknown (only links, if anything).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipState {
    pub data: Option<RelationshipData>,
    pub links: Option<Links>,
    pub meta: Option<Value>,
}

/// Keys whose observable value changed during an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataChanges {
    pub attributes: Vec<String>,
    pub relationships: Vec<String>,
}

impl DataChanges {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.relationships.is_empty()
    }
}

/// Layered attribute store: local edits win over in-flight values, which win
/// over the canonical (server) values.
#[derive(Clone, Debug, Default)]
pub struct RecordData {
    canonical: Map<String, Value>,
    in_flight: Map<String, Value>,
    local: Map<String, Value>,
    relationships: BTreeMap<String, RelationshipState>,
    local_relationships: BTreeMap<String, RelationshipData>,
    in_flight_relationships: BTreeMap<String, RelationshipData>,
}

impl RecordData {
    pub fn new() -> Self {
        RecordData::default()
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.local
            .get(key)
            .or_else(|| self.in_flight.get(key))
            .or_else(|| self.canonical.get(key))
    }

    /// Current values of every attribute that has one.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut merged = self.canonical.clone();
        for (key, value) in self.in_flight.iter().chain(self.local.iter()) {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn canonical_attr(&self, key: &str) -> Option<&Value> {
        self.canonical.get(key)
    }

    fn is_shadowed(&self, key: &str) -> bool {
        self.local.contains_key(key) || self.in_flight.contains_key(key)
    }

    /// Apply server data. Only keys whose visible value changed are reported.
    pub fn push_data(
        &mut self,
        attributes: Option<&Map<String, Value>>,
        relationships: BTreeMap<String, RelationshipState>,
    ) -> DataChanges {
        let mut changes = DataChanges::default();

        if let Some(attributes) = attributes {
            for (key, value) in attributes {
                let differs = self.canonical.get(key) != Some(value);
                if differs && !self.is_shadowed(key) {
                    changes.attributes.push(key.clone());
                }
                self.canonical.insert(key.clone(), value.clone());
            }
        }

        for (key, incoming) in relationships {
            if self.merge_relationship(&key, incoming) && !self.local_relationships.contains_key(&key)
            {
                changes.relationships.push(key);
            }
        }

        changes
    }

    fn merge_relationship(&mut self, key: &str, incoming: RelationshipState) -> bool {
        let state = self.relationships.entry(key.to_string()).or_default();
        let before = state.clone();
        if incoming.data.is_some() {
            state.data = incoming.data;
        }
        if incoming.links.is_some() {
            state.links = incoming.links;
        }
        if incoming.meta.is_some() {
            state.meta = incoming.meta;
        }
        *state != before
    }

    /// Returns true when the visible value changed.
    pub fn set_attr(&mut self, key: &str, value: Value) -> bool {
        if self.attr(key) == Some(&value) {
            return false;
        }

        let matches_original =
            !self.in_flight.contains_key(key) && self.canonical.get(key) == Some(&value);
        if matches_original {
            self.local.remove(key);
        } else {
            self.local.insert(key.to_string(), value);
        }
        true
    }

    /// `key -> (original, current)` for every pending change.
    pub fn changed_attributes(&self) -> BTreeMap<String, (Value, Value)> {
        let mut changed = BTreeMap::new();
        for (key, value) in self.in_flight.iter().chain(self.local.iter()) {
            let original = self.canonical.get(key).cloned().unwrap_or(Value::Null);
            changed.insert(key.clone(), (original, value.clone()));
        }
        changed
    }

    pub fn has_changed_attributes(&self) -> bool {
        !self.local.is_empty() || !self.in_flight.is_empty()
    }

    /// Drop local edits, returning the keys whose value reverted.
    pub fn rollback_attributes(&mut self) -> Vec<String> {
        let keys: Vec<String> = self.local.keys().cloned().collect();
        self.local.clear();
        self.local_relationships.clear();
        keys
    }

    /// Local edits become the in-flight layer of a save.
    pub fn will_commit(&mut self) {
        let local = std::mem::take(&mut self.local);
        self.in_flight.extend(local);
        let local_relationships = std::mem::take(&mut self.local_relationships);
        self.in_flight_relationships.extend(local_relationships);
    }

    /// The save succeeded: in-flight values (and whatever the server sent back)
    /// become canonical.
    pub fn did_commit(
        &mut self,
        attributes: Option<&Map<String, Value>>,
        relationships: BTreeMap<String, RelationshipState>,
    ) -> DataChanges {
        let in_flight = std::mem::take(&mut self.in_flight);
        self.canonical.extend(in_flight);

        let committed = std::mem::take(&mut self.in_flight_relationships);
        for (key, data) in committed {
            self.relationships.entry(key).or_default().data = Some(data);
        }

        self.push_data(attributes, relationships)
    }

    /// The save failed: in-flight values return to the local layer unless they
    /// were edited again meanwhile.
    pub fn commit_was_rejected(&mut self) {
        let in_flight = std::mem::take(&mut self.in_flight);
        for (key, value) in in_flight {
            if !self.local.contains_key(&key) {
                self.local.insert(key, value);
            }
        }
        let in_flight_relationships = std::mem::take(&mut self.in_flight_relationships);
        for (key, data) in in_flight_relationships {
            self.local_relationships.entry(key).or_insert(data);
        }
    }

    /// Effective relationship state, local edits applied.
    pub fn relationship(&self, key: &str) -> Option<RelationshipState> {
        let local = self
            .local_relationships
            .get(key)
            .or_else(|| self.in_flight_relationships.get(key));
        match (self.relationships.get(key), local) {
            (Some(state), Some(data)) => Some(RelationshipState {
                data: Some(data.clone()),
                ..state.clone()
            }),
            (Some(state), None) => Some(state.clone()),
            (None, Some(data)) => Some(RelationshipState {
                data: Some(data.clone()),
                ..Default::default()
            }),
            (None, None) => None,
        }
    }

    /// Returns true when the effective linkage changed.
    pub fn set_relationship(&mut self, key: &str, data: RelationshipData) -> bool {
        let current = self.relationship(key).and_then(|state| state.data);
        if current.as_ref() == Some(&data) {
            return false;
        }
        let canonical = self.relationships.get(key).and_then(|state| state.data.as_ref());
        if canonical == Some(&data) && !self.in_flight_relationships.contains_key(key) {
            self.local_relationships.remove(key);
        } else {
            self.local_relationships.insert(key.to_string(), data);
        }
        true
    }

    pub fn relationship_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .relationships
            .keys()
            .chain(self.local_relationships.keys())
            .chain(self.in_flight_relationships.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

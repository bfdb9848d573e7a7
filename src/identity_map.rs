//! Per-type tables from identifier to [`InternalModel`].

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::identifier::{Lid, RecordIdentifier};
use crate::record::InternalModel;

/// Models of one type, in insertion order.
#[derive(Debug)]
pub struct InternalModelMap {
    kind: String,
    models: IndexMap<Lid, InternalModel>,
}

impl InternalModelMap {
    pub fn new(kind: impl Into<String>) -> Self {
        InternalModelMap {
            kind: kind.into(),
            models: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, lid: &Lid) -> Option<&InternalModel> {
        self.models.get(lid)
    }

    pub fn get_mut(&mut self, lid: &Lid) -> Option<&mut InternalModel> {
        self.models.get_mut(lid)
    }

    pub fn contains(&self, lid: &Lid) -> bool {
        self.models.contains_key(lid)
    }

    /// # Panics
    ///
    /// When a model is already registered for the same identifier.
    pub fn insert(&mut self, model: InternalModel) {
        let lid = model.identifier().lid().clone();
        if self.models.contains_key(&lid) {
            panic!(
                "an internal model for {} is already registered",
                model.identifier()
            );
        }
        self.models.insert(lid, model);
    }

    pub fn remove(&mut self, lid: &Lid) -> Option<InternalModel> {
        self.models.shift_remove(lid)
    }

    pub fn lids(&self) -> impl Iterator<Item = &Lid> {
        self.models.keys()
    }

    pub fn models(&self) -> impl Iterator<Item = &InternalModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// All internal models, grouped by type.
#[derive(Debug, Default)]
pub struct IdentityMap {
    maps: HashMap<String, InternalModelMap>,
}

impl IdentityMap {
    pub fn new() -> Self {
        IdentityMap::default()
    }

    pub fn map_for(&mut self, kind: &str) -> &mut InternalModelMap {
        self.maps
            .entry(kind.to_string())
            .or_insert_with(|| InternalModelMap::new(kind))
    }

    pub fn peek_map(&self, kind: &str) -> Option<&InternalModelMap> {
        self.maps.get(kind)
    }

    pub fn get(&self, kind: &str, lid: &Lid) -> Option<&InternalModel> {
        self.maps.get(kind).and_then(|map| map.get(lid))
    }

    pub fn get_mut(&mut self, kind: &str, lid: &Lid) -> Option<&mut InternalModel> {
        self.maps.get_mut(kind).and_then(|map| map.get_mut(lid))
    }

    pub fn insert(&mut self, model: InternalModel) {
        let kind = model.identifier().kind().to_string();
        self.map_for(&kind).insert(model);
    }

    /// The model for `identifier`, registering an empty one if needed.
    pub fn get_or_insert(&mut self, identifier: &RecordIdentifier) -> &mut InternalModel {
        self.map_for(identifier.kind())
            .models
            .entry(identifier.lid().clone())
            .or_insert_with(|| InternalModel::new(identifier.clone()))
    }

    pub fn remove(&mut self, kind: &str, lid: &Lid) -> Option<InternalModel> {
        self.maps.get_mut(kind).and_then(|map| map.remove(lid))
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.maps.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.maps.values().map(InternalModelMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }
}

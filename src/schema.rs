//! Model schemas: which attributes and relationships a record type declares.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    BelongsTo,
    HasMany,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub kind: RelationshipKind,
    /// Type name of the related records.
    #[serde(rename = "type")]
    pub related: String,
}

/// Declared shape of one record type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    attributes: Vec<String>,
    relationships: BTreeMap<String, RelationshipSchema>,
}

impl ModelSchema {
    pub fn new() -> Self {
        ModelSchema::default()
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.attributes.contains(&name) {
            self.attributes.push(name);
        }
        self
    }

    pub fn belongs_to(mut self, name: impl Into<String>, related: impl Into<String>) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipSchema {
                kind: RelationshipKind::BelongsTo,
                related: related.into(),
            },
        );
        self
    }

    pub fn has_many(mut self, name: impl Into<String>, related: impl Into<String>) -> Self {
        self.relationships.insert(
            name.into(),
            RelationshipSchema {
                kind: RelationshipKind::HasMany,
                related: related.into(),
            },
        );
        self
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.get(name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&str, &RelationshipSchema)> {
        self.relationships
            .iter()
            .map(|(name, schema)| (name.as_str(), schema))
    }
}

/// Registry of model schemas keyed by type name.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    models: HashMap<String, ModelSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, model: ModelSchema) {
        self.models.insert(kind.into(), model);
    }

    pub fn get(&self, kind: &str) -> Option<&ModelSchema> {
        self.models.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.models.contains_key(kind)
    }

    /// # Panics
    ///
    /// When no schema was registered for `kind`.
    pub fn model_for(&self, kind: &str) -> &ModelSchema {
        match self.models.get(kind) {
            Some(model) => model,
            None => panic!("no model was found for '{}'", kind),
        }
    }
}

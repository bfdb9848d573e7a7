use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use super::Store;
use crate::adapter::RequestType;
use crate::document::{Linkage, NormalizedDocument, ResourceObject};
use crate::error::Result;
use crate::identifier::{RecordIdentifier, ResourceKey};
use crate::notification::NotificationKind;
use crate::record::{RecordEvent, RecordHandle, RelationshipData, RelationshipState};

/// What a push produced, shaped like the document's primary data.
#[derive(Clone, Debug, PartialEq)]
pub enum Pushed<T> {
    One(Option<T>),
    Many(Vec<T>),
}

impl<T> Pushed<T> {
    /// The single result, or the first of many.
    pub fn one(self) -> Option<T> {
        match self {
            Pushed::One(value) => value,
            Pushed::Many(values) => values.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Pushed::One(value) => value.into_iter().collect(),
            Pushed::Many(values) => values,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Pushed<U> {
        match self {
            Pushed::One(value) => Pushed::One(value.map(f)),
            Pushed::Many(values) => Pushed::Many(values.into_iter().map(&mut f).collect()),
        }
    }
}

impl Store {
    /// Load a normalized document into the cache and return its primary
    /// records.
    ///
    /// # Panics
    ///
    /// When a resource has a type with no registered model.
    pub fn push(&mut self, document: NormalizedDocument) -> Result<Pushed<RecordHandle>> {
        let pushed = self.push_normalized(document)?;
        Ok(pushed.map(|identifier| self.ensure_model(&identifier).record()))
    }

    /// Like [`push`](Self::push) without materializing records.
    pub fn push_normalized(&mut self, document: NormalizedDocument) -> Result<Pushed<RecordIdentifier>> {
        self.assert_alive();
        let is_collection = document.is_collection();
        let identifiers = self.push_document(&document)?;
        Ok(if is_collection {
            Pushed::Many(identifiers)
        } else {
            Pushed::One(identifiers.into_iter().next())
        })
    }

    /// Normalize a raw payload with `kind`'s serializer, then push it.
    pub fn push_payload(&mut self, kind: &str, payload: Value) -> Result<()> {
        let document = self.normalize(kind, payload)?;
        self.push_normalized(document)?;
        Ok(())
    }

    pub fn normalize(&self, kind: &str, payload: Value) -> Result<NormalizedDocument> {
        self.assert_alive();
        Ok(self.registry.serializer_for(kind).normalize(kind, payload)?)
    }

    pub(crate) fn normalize_response(
        &self,
        kind: &str,
        payload: Value,
        id: Option<&str>,
        request_type: RequestType,
    ) -> Result<NormalizedDocument> {
        let serializer = self.registry.serializer_for(kind);
        Ok(serializer.normalize_response(kind, payload, id, request_type)?)
    }

    /// Push side-loads first, then primary data. Returns the primary
    /// identifiers in document order.
    pub(crate) fn push_document(&mut self, document: &NormalizedDocument) -> Result<Vec<RecordIdentifier>> {
        for resource in &document.included {
            self.push_resource(resource)?;
        }
        document
            .primary()
            .into_iter()
            .map(|resource| self.push_resource(resource))
            .collect()
    }

    pub(crate) fn push_resource(&mut self, resource: &ResourceObject) -> Result<RecordIdentifier> {
        self.schema.model_for(&resource.kind);
        let identifier = self.identifier_for(ResourceKey::from(resource));
        let relationships = self.relationship_states(resource);

        let model = self.ensure_model(&identifier);
        let was_loaded = model.is_loaded();
        let changes = model
            .data_mut()
            .push_data(resource.attributes.as_ref(), relationships);
        self.transition(&identifier, RecordEvent::PushedData)?;

        if was_loaded {
            for key in &changes.attributes {
                self.notify(&identifier, NotificationKind::Attributes, Some(key));
            }
            for key in &changes.relationships {
                self.notify(&identifier, NotificationKind::Relationships, Some(key));
            }
        }
        trace!(%identifier, changed = changes.attributes.len(), "pushed resource");
        Ok(identifier)
    }

    /// Resolve a resource's relationship linkage to identifiers, skipping
    /// relationships the model does not declare.
    pub(crate) fn relationship_states(&mut self, resource: &ResourceObject) -> BTreeMap<String, RelationshipState> {
        let mut states = BTreeMap::new();
        let Some(relationships) = &resource.relationships else {
            return states;
        };

        for (key, relationship) in relationships {
            let declared = self
                .schema
                .get(&resource.kind)
                .is_some_and(|model| model.relationship(key).is_some());
            if !declared {
                trace!(kind = %resource.kind, key, "skipped undeclared relationship");
                continue;
            }

            let data = match &relationship.data {
                None => None,
                Some(Linkage::One(None)) => Some(RelationshipData::One(None)),
                Some(Linkage::One(Some(reference))) => {
                    let related = self.identifier_for(ResourceKey::from(reference));
                    Some(RelationshipData::One(Some(related.lid().clone())))
                }
                Some(Linkage::Many(references)) => Some(RelationshipData::Many(
                    references
                        .iter()
                        .map(|reference| self.identifier_for(ResourceKey::from(reference)).lid().clone())
                        .collect(),
                )),
            };
            states.insert(
                key.clone(),
                RelationshipState {
                    data,
                    links: relationship.links.clone(),
                    meta: relationship.meta.clone(),
                },
            );
        }
        states
    }
}

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use super::Store;
use crate::adapter::RequestType;
use crate::deferred::Deferred;
use crate::document::ResourceRef;
use crate::error::{Result, StoreError};
use crate::fetch::{FindOptions, SnapshotOptions, StoreRequest};
use crate::identifier::{Lid, RecordIdentifier, ResourceKey};
use crate::notification::NotificationKind;
use crate::record::{RecordHandle, RelationshipData, RelationshipState};
use crate::schema::{RelationshipKind, RelationshipSchema};

impl Store {
    fn relationship_schema(
        &self,
        identifier: &RecordIdentifier,
        name: &str,
        kind: RelationshipKind,
    ) -> Result<RelationshipSchema> {
        self.schema
            .model_for(identifier.kind())
            .relationship(name)
            .filter(|relationship| relationship.kind == kind)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRelationship {
                kind: identifier.kind().to_string(),
                key: name.to_string(),
            })
    }

    /// Linkage from a property value: an id, a `{ type, id }` object or, for
    /// `hasMany`, an array of either.
    pub(super) fn relationship_data_from_value(
        &mut self,
        related: &str,
        kind: RelationshipKind,
        value: &Value,
    ) -> RelationshipData {
        match (kind, value) {
            (RelationshipKind::HasMany, Value::Array(values)) => RelationshipData::Many(
                values
                    .iter()
                    .filter_map(|value| self.related_lid(related, value))
                    .collect(),
            ),
            (RelationshipKind::HasMany, _) => RelationshipData::Many(Vec::new()),
            (RelationshipKind::BelongsTo, value) => RelationshipData::One(self.related_lid(related, value)),
        }
    }

    fn related_lid(&mut self, related: &str, value: &Value) -> Option<Lid> {
        let key = match value {
            Value::String(id) => ResourceKey::new(related, id.clone()),
            Value::Number(id) => ResourceKey::new(related, id.to_string()),
            Value::Object(_) => {
                let reference: ResourceRef = serde_json::from_value(value.clone()).ok()?;
                ResourceKey::from(&reference)
            }
            _ => return None,
        };
        Some(self.identifier_for(key).lid().clone())
    }

    /// Point a `belongsTo` at `related`, or clear it with `None`.
    pub fn set_belongs_to(
        &mut self,
        key: impl Into<ResourceKey>,
        name: &str,
        related: Option<ResourceKey>,
    ) -> Result<bool> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::BelongsTo)?;
        let lid = related.map(|related| self.identifier_for(related).lid().clone());
        self.set_relationship(&identifier, name, RelationshipData::One(lid))
    }

    /// Replace the members of a `hasMany`.
    pub fn set_has_many(
        &mut self,
        key: impl Into<ResourceKey>,
        name: &str,
        related: Vec<ResourceKey>,
    ) -> Result<bool> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::HasMany)?;
        let lids = related
            .into_iter()
            .map(|related| self.identifier_for(related).lid().clone())
            .collect();
        self.set_relationship(&identifier, name, RelationshipData::Many(lids))
    }

    fn set_relationship(&mut self, identifier: &RecordIdentifier, name: &str, data: RelationshipData) -> Result<bool> {
        let model = self
            .model_mut(identifier)
            .ok_or_else(|| StoreError::Unloaded(identifier.clone()))?;
        let before = model.state();
        let changed = model.set_relationship(name, data)?;
        let after = model.state();
        if changed {
            self.notify(identifier, NotificationKind::Relationships, Some(name));
        }
        if before != after {
            self.state_did_change(identifier);
        }
        Ok(changed)
    }

    /// The loaded record a `belongsTo` points at. `None` when the
    /// relationship is empty or the related record is not loaded.
    pub fn belongs_to(&mut self, key: impl Into<ResourceKey>, name: &str) -> Result<Option<RecordHandle>> {
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::BelongsTo)?;
        let lid = match self.relationship_state(&identifier, name).and_then(|state| state.data) {
            Some(RelationshipData::One(Some(lid))) => lid,
            _ => return Ok(None),
        };
        Ok(self.loaded_record(&lid))
    }

    /// The loaded, non-deleted members of a `hasMany`.
    pub fn has_many(&mut self, key: impl Into<ResourceKey>, name: &str) -> Result<Vec<RecordHandle>> {
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::HasMany)?;
        let lids = match self.relationship_state(&identifier, name).and_then(|state| state.data) {
            Some(data) => data.lids().into_iter().cloned().collect::<Vec<_>>(),
            None => return Ok(Vec::new()),
        };
        Ok(lids.iter().filter_map(|lid| self.loaded_record(lid)).collect())
    }

    fn relationship_state(&self, identifier: &RecordIdentifier, name: &str) -> Option<RelationshipState> {
        self.model(identifier)?.data().relationship(name)
    }

    pub(super) fn loaded_record(&mut self, lid: &Lid) -> Option<RecordHandle> {
        let identifier = self.identifiers.resolve(lid)?.clone();
        let model = self.model_mut(&identifier)?;
        (model.is_loaded() && !model.is_deleted()).then(|| model.record())
    }

    /// Whether every record `data` points at is loaded.
    fn all_loaded(&self, data: &RelationshipData) -> bool {
        data.lids().into_iter().all(|lid| {
            self.identifiers
                .resolve(lid)
                .and_then(|identifier| self.model(identifier))
                .is_some_and(|model| model.is_loaded())
        })
    }

    /// Load a `hasMany`, from its `related` link when the linkage is
    /// missing or incomplete, otherwise by finding each member.
    pub fn find_has_many(&mut self, key: impl Into<ResourceKey>, name: &str) -> Result<Deferred<Vec<RecordHandle>>> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::HasMany)?;
        let state = self.relationship_state(&identifier, name).unwrap_or_default();

        let link = state.links.as_ref().and_then(|links| links.related()).map(str::to_string);
        let use_link = match &state.data {
            None => true,
            Some(data) => !self.all_loaded(data),
        };
        if let (Some(url), true) = (link, use_link) {
            let deferred = Deferred::new();
            self.scheduler.schedule(StoreRequest::FindHasMany {
                owner: identifier,
                key: name.to_string(),
                url,
                deferred: deferred.clone(),
            });
            return Ok(deferred);
        }

        let lids: Vec<Lid> = match &state.data {
            Some(data) => data.lids().into_iter().cloned().collect(),
            None => Vec::new(),
        };
        let mut members = Vec::with_capacity(lids.len());
        for lid in lids {
            let Some(related) = self.identifiers.resolve(&lid).cloned() else {
                continue;
            };
            let loaded = self.model(&related).is_some_and(|model| model.is_loaded());
            if loaded {
                // Deleted members are hidden, not refetched.
                if let Some(record) = self.loaded_record(&lid) {
                    members.push(Deferred::resolved(record));
                }
            } else if related.id().is_some() {
                members.push(self.fetch_record(&related, FindOptions::default()));
            }
        }
        Ok(Deferred::join_all(members))
    }

    /// Load the record a `belongsTo` points at, through its `related` link
    /// when the linkage is missing or the target is not loaded.
    pub fn find_belongs_to(&mut self, key: impl Into<ResourceKey>, name: &str) -> Result<Deferred<Option<RecordHandle>>> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.relationship_schema(&identifier, name, RelationshipKind::BelongsTo)?;
        let state = self.relationship_state(&identifier, name).unwrap_or_default();

        let link = state.links.as_ref().and_then(|links| links.related()).map(str::to_string);
        let use_link = match &state.data {
            None => true,
            Some(data) => !self.all_loaded(data),
        };
        if let (Some(url), true) = (link, use_link) {
            let deferred = Deferred::new();
            self.scheduler.schedule(StoreRequest::FindBelongsTo {
                owner: identifier,
                key: name.to_string(),
                url,
                deferred: deferred.clone(),
            });
            return Ok(deferred);
        }

        let lid = match state.data {
            Some(RelationshipData::One(Some(lid))) => lid,
            _ => return Ok(Deferred::resolved(None)),
        };
        let Some(related) = self.identifiers.resolve(&lid).cloned() else {
            return Ok(Deferred::resolved(None));
        };
        if self.model(&related).is_some_and(|model| model.is_loaded()) {
            return Ok(Deferred::resolved(self.loaded_record(&lid)));
        }
        if related.id().is_none() {
            return Ok(Deferred::resolved(None));
        }
        Ok(self.fetch_record(&related, FindOptions::default()).map(Some))
    }

    /// Fetch a relationship link. Returns the owner's current identifier and
    /// the pushed primary identifiers.
    fn fetch_relationship_link(
        &mut self,
        owner: &RecordIdentifier,
        key: &str,
        url: &str,
        request_type: RequestType,
    ) -> Result<(RecordIdentifier, Vec<RecordIdentifier>)> {
        let owner = self
            .identifiers
            .resolve(owner.lid())
            .cloned()
            .ok_or_else(|| StoreError::Unloaded(owner.clone()))?;
        let related = self
            .schema
            .model_for(owner.kind())
            .relationship(key)
            .map(|relationship| relationship.related.clone())
            .ok_or_else(|| StoreError::UnknownRelationship {
                kind: owner.kind().to_string(),
                key: key.to_string(),
            })?;

        let adapter = self.registry.adapter_for(owner.kind());
        let payload = {
            let snapshot = self.snapshot(&owner, SnapshotOptions::default());
            match request_type {
                RequestType::FindBelongsTo => adapter.find_belongs_to(&snapshot, url, key),
                _ => adapter.find_has_many(&snapshot, url, key),
            }
        };
        trace!(%owner, key, url, "fetched relationship link");

        let document = self.normalize_response(&related, payload?, None, request_type)?;
        let pushed = self.push_document(&document)?;
        Ok((owner, pushed))
    }

    /// Make `data` the server's linkage for `key`, notifying on change.
    fn set_canonical_relationship(&mut self, owner: &RecordIdentifier, key: &str, data: RelationshipData) {
        let Some(model) = self.model_mut(owner) else {
            return;
        };
        let mut relationships = BTreeMap::new();
        relationships.insert(
            key.to_string(),
            RelationshipState {
                data: Some(data),
                ..Default::default()
            },
        );
        let changes = model.data_mut().push_data(None, relationships);
        for key in &changes.relationships {
            self.notify(owner, NotificationKind::Relationships, Some(key));
        }
    }

    pub(super) fn run_find_has_many(
        &mut self,
        owner: &RecordIdentifier,
        key: &str,
        url: &str,
        deferred: Deferred<Vec<RecordHandle>>,
    ) {
        match self.fetch_relationship_link(owner, key, url, RequestType::FindHasMany) {
            Ok((owner, identifiers)) => {
                let lids = identifiers.iter().map(|identifier| identifier.lid().clone()).collect();
                self.set_canonical_relationship(&owner, key, RelationshipData::Many(lids));
                let records = identifiers
                    .iter()
                    .filter_map(|identifier| self.loaded_record(identifier.lid()))
                    .collect();
                deferred.resolve(records);
            }
            Err(error) => {
                deferred.reject(error);
            }
        }
    }

    pub(super) fn run_find_belongs_to(
        &mut self,
        owner: &RecordIdentifier,
        key: &str,
        url: &str,
        deferred: Deferred<Option<RecordHandle>>,
    ) {
        match self.fetch_relationship_link(owner, key, url, RequestType::FindBelongsTo) {
            Ok((owner, identifiers)) => {
                let lid = identifiers.first().map(|identifier| identifier.lid().clone());
                self.set_canonical_relationship(&owner, key, RelationshipData::One(lid.clone()));
                deferred.resolve(lid.and_then(|lid| self.loaded_record(&lid)));
            }
            Err(error) => {
                deferred.reject(error);
            }
        }
    }
}

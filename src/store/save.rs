use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::Store;
use crate::adapter::RequestType;
use crate::deferred::Deferred;
use crate::document::{coerce_id, NormalizedDocument};
use crate::error::{Result, StoreError};
use crate::fetch::{PendingSaveItem, RequestOptions, SnapshotOptions};
use crate::identifier::{RecordIdentifier, ResourceKey};
use crate::notification::NotificationKind;
use crate::record::{RecordEvent, RecordHandle, RecordState};
use crate::scheduler::Flush;

impl Store {
    /// Create a new record that has not been saved.
    ///
    /// `properties` holds attribute values, relationship linkage (ids, or
    /// arrays of ids for `hasMany`) and optionally a client-assigned `id`.
    ///
    /// # Panics
    ///
    /// When `kind` is unknown, `properties` is not an object, or a loaded
    /// record of this type already uses the given id.
    pub fn create_record(&mut self, kind: &str, properties: Value) -> Result<RecordHandle> {
        self.assert_alive();
        let mut properties = match properties {
            Value::Object(properties) => properties,
            Value::Null => Map::new(),
            other => panic!("create_record expects an object of properties, got {}", other),
        };
        let schema = self.schema.model_for(kind).clone();
        for key in properties.keys().filter(|key| key.as_str() != "id") {
            if !schema.has_attribute(key) && schema.relationship(key).is_none() {
                return Err(StoreError::UnknownAttribute {
                    kind: kind.to_string(),
                    key: key.clone(),
                });
            }
        }

        let id = match properties.remove("id") {
            Some(Value::String(id)) => coerce_id(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        let key = match &id {
            Some(id) => {
                assert!(
                    !self.has_record_for_id(kind, id),
                    "the id {} has already been used with another '{}' record",
                    id,
                    kind
                );
                ResourceKey::new(kind, id.clone())
            }
            None => ResourceKey {
                kind: Some(kind.to_string()),
                ..ResourceKey::default()
            },
        };

        let identifier = self.identifier_for(key);
        self.ensure_model(&identifier);
        self.transition(&identifier, RecordEvent::DidCreateRecord)?;

        for (key, value) in properties {
            match schema.relationship(&key) {
                Some(relationship) => {
                    let related = relationship.related.clone();
                    let kind = relationship.kind;
                    let data = self.relationship_data_from_value(&related, kind, &value);
                    if let Some(model) = self.model_mut(&identifier) {
                        model.data_mut().set_relationship(&key, data);
                    }
                }
                None => {
                    if let Some(model) = self.model_mut(&identifier) {
                        model.data_mut().set_attr(&key, value);
                    }
                }
            }
        }

        debug!(%identifier, "created record");
        Ok(self.ensure_model(&identifier).record())
    }

    /// Mark a record deleted without saving. New records are discarded.
    pub fn delete_record(&mut self, key: impl Into<ResourceKey>) -> Result<()> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.transition(&identifier, RecordEvent::DeleteRecord)?;
        Ok(())
    }

    /// Delete and save in one step.
    pub fn destroy_record(&mut self, key: impl Into<ResourceKey>, options: RequestOptions) -> Result<Deferred<RecordHandle>> {
        let identifier = self.existing(key)?;
        self.delete_record(&identifier)?;
        if let Some(model) = self.model_mut(&identifier) {
            if model.state() == RecordState::DeletedSaved {
                return Ok(Deferred::resolved(model.record()));
            }
        }
        self.save_record(&identifier, options)
    }

    /// Queue a create, update or delete for the record, chosen from its
    /// state. Saves are sent on the next flush.
    pub fn save_record(&mut self, key: impl Into<ResourceKey>, options: RequestOptions) -> Result<Deferred<RecordHandle>> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        let model = self
            .model_mut(&identifier)
            .ok_or_else(|| StoreError::Unloaded(identifier.clone()))?;
        if model.state() == RecordState::DeletedSaved {
            return Ok(Deferred::resolved(model.record()));
        }

        self.transition(&identifier, RecordEvent::WillCommit)?;
        if let Some(model) = self.model_mut(&identifier) {
            model.errors_mut().clear();
            model.data_mut().will_commit();
        }

        let (deferred, first) = self.fetch.schedule_save(&identifier, options);
        if first {
            self.scheduler.schedule_flush(Flush::Saves);
        }
        Ok(deferred)
    }

    pub(super) fn flush_saves(&mut self) {
        for item in self.fetch.take_saves() {
            self.save_one(item);
        }
    }

    fn save_one(&mut self, item: PendingSaveItem) {
        let current = self
            .identifiers
            .resolve(item.identifier.lid())
            .cloned()
            .zip(self.model(&item.identifier).map(|model| model.state()));
        let Some((identifier, state)) = current else {
            item.deferred
                .reject(StoreError::Unloaded(item.identifier));
            return;
        };

        let request_type = match state {
            RecordState::CreatedInFlight => RequestType::CreateRecord,
            RecordState::DeletedInFlight => RequestType::DeleteRecord,
            RecordState::UpdatedInFlight => RequestType::UpdateRecord,
            state => {
                item.deferred.reject(StoreError::InvalidTransition {
                    identifier,
                    state,
                    event: RecordEvent::DidCommit.name(),
                });
                return;
            }
        };

        let kind = identifier.kind().to_string();
        let adapter = self.registry.adapter_for(&kind);
        let payload = {
            let snapshot = self.snapshot(&identifier, SnapshotOptions::from(&item.options));
            match request_type {
                RequestType::CreateRecord => adapter.create_record(&kind, &snapshot),
                RequestType::DeleteRecord => adapter.delete_record(&kind, &snapshot),
                _ => adapter.update_record(&kind, &snapshot),
            }
        };
        trace!(%identifier, request = %request_type, "sent save");

        let document = payload
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(&kind, payload, identifier.id(), request_type));
        match document {
            Ok(document) => self.did_save_record(&identifier, &document, &item.deferred),
            Err(error) => self.did_fail_save(&identifier, error, &item.deferred),
        }
    }

    fn did_save_record(&mut self, identifier: &RecordIdentifier, document: &NormalizedDocument, deferred: &Deferred<RecordHandle>) {
        for resource in &document.included {
            if let Err(error) = self.push_resource(resource) {
                self.did_fail_save(identifier, error, deferred);
                return;
            }
        }

        let primary = document.primary().into_iter().next();
        let mut identifier = identifier.clone();
        if let Some(id) = primary.and_then(|resource| resource.id.clone()) {
            if identifier.id().is_none() {
                identifier = self.update_identifier(&identifier, &ResourceKey::new(identifier.kind(), id));
            }
        }
        if identifier.id().is_none() {
            self.did_fail_save(&identifier, StoreError::MissingId(identifier.clone()), deferred);
            return;
        }

        let relationships = match primary {
            Some(resource) => self.relationship_states(resource),
            None => Default::default(),
        };
        let Some(model) = self.model_mut(&identifier) else {
            deferred.reject(StoreError::Unloaded(identifier));
            return;
        };
        let had_errors = !model.errors().is_empty();
        model.errors_mut().clear();
        let changes = model
            .data_mut()
            .did_commit(primary.and_then(|resource| resource.attributes.as_ref()), relationships);

        if let Err(error) = self.transition(&identifier, RecordEvent::DidCommit) {
            deferred.reject(error);
            return;
        }
        for key in &changes.attributes {
            self.notify(&identifier, NotificationKind::Attributes, Some(key));
        }
        for key in &changes.relationships {
            self.notify(&identifier, NotificationKind::Relationships, Some(key));
        }
        if had_errors {
            self.notify(&identifier, NotificationKind::Errors, None);
        }

        debug!(%identifier, "saved record");
        deferred.resolve(self.ensure_model(&identifier).record());
    }

    fn did_fail_save(&mut self, identifier: &RecordIdentifier, error: StoreError, deferred: &Deferred<RecordHandle>) {
        if let Some(model) = self.model_mut(identifier) {
            model.data_mut().commit_was_rejected();
        }

        let outcome = match error.validation_errors() {
            Some(errors) => {
                if let Some(model) = self.model_mut(identifier) {
                    model.errors_mut().replace(errors);
                }
                let outcome = self.transition(identifier, RecordEvent::BecameInvalid);
                let keys: Vec<String> = errors.iter().map(|error| error.key().to_string()).collect();
                for key in keys {
                    self.notify(identifier, NotificationKind::Errors, Some(&key));
                }
                outcome
            }
            None => self.transition(identifier, RecordEvent::BecameError),
        };
        if let Err(transition) = outcome {
            trace!(%identifier, error = %transition, "save failure left state unchanged");
        }

        debug!(%identifier, %error, "save failed");
        deferred.reject(error);
    }

    /// Drop a record from the cache. Fails while the record is being saved.
    pub fn unload_record(&mut self, key: impl Into<ResourceKey>) -> Result<()> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        self.unload_internal(&identifier)
    }

    /// Unload every record of `kind`, or every record when `None`. Records
    /// being saved are kept.
    pub fn unload_all(&mut self, kind: Option<&str>) {
        self.assert_alive();
        let kinds = match kind {
            Some(kind) => vec![kind.to_string()],
            None => self.models.kinds(),
        };
        for kind in kinds {
            let identifiers: Vec<RecordIdentifier> = match self.models.peek_map(&kind) {
                Some(map) => map.models().map(|model| model.identifier().clone()).collect(),
                None => continue,
            };
            for identifier in identifiers {
                if let Err(error) = self.unload_internal(&identifier) {
                    trace!(%identifier, %error, "kept record during unload_all");
                }
            }
        }
    }

    pub(crate) fn unload_internal(&mut self, identifier: &RecordIdentifier) -> Result<()> {
        let Some(current) = self.identifiers.resolve(identifier.lid()).cloned() else {
            return Ok(());
        };
        if self.model(&current).is_none() {
            self.identifiers.forget_record_identifier(&current);
            return Ok(());
        }
        self.transition(&current, RecordEvent::UnloadRecord)?;

        if let Some(mut model) = self.models.remove(current.kind(), current.lid()) {
            let arrays = model.take_record_arrays();
            let changes = self.arrays.remove_from_adapter_populated(current.lid(), arrays);
            self.apply_array_changes(changes);
        }
        self.record_did_change(&current);
        self.notify(&current, NotificationKind::Unload, None);
        self.notifications.remove(current.lid());
        self.identifiers.forget_record_identifier(&current);
        debug!(identifier = %current, "unloaded record");
        Ok(())
    }

    /// Discard local changes. A new record is discarded entirely.
    pub fn rollback_attributes(&mut self, key: impl Into<ResourceKey>) -> Result<()> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        let model = self
            .model_mut(&identifier)
            .ok_or_else(|| StoreError::Unloaded(identifier.clone()))?;
        let before = model.state();
        let had_errors = !model.errors().is_empty();
        let changes = model.rollback_attributes()?;
        let after = model.state();

        for key in &changes.attributes {
            self.notify(&identifier, NotificationKind::Attributes, Some(key));
        }
        if had_errors {
            self.notify(&identifier, NotificationKind::Errors, None);
        }
        if before != after {
            self.state_did_change(&identifier);
        }
        Ok(())
    }
}

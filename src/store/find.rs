use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::Store;
use crate::adapter::{Adapter, RequestType};
use crate::deferred::Deferred;
use crate::diagnostics::DiagnosticKind;
use crate::document::{Linkage, NormalizedDocument, RelationshipObject, ResourceObject, ResourceRef};
use crate::error::StoreError;
use crate::fetch::{partition_response, FindOptions, PendingFetchItem, SnapshotOptions};
use crate::identifier::{Lid, RecordIdentifier, ResourceKey};
use crate::record::{RecordEvent, RecordHandle};
use crate::scheduler::Flush;
use crate::schema::RelationshipKind;
use crate::snapshot::Snapshot;

impl Store {
    /// Find one record, from the cache when possible.
    ///
    /// Unloaded records are fetched; every `find_record` for the same record
    /// made before the next flush shares one adapter call. Cached records
    /// resolve right away unless a reload is requested or the adapter asks
    /// for one, and may be refreshed in the background.
    ///
    /// # Panics
    ///
    /// When `key` has neither an id nor a lid, or names an unknown type.
    pub fn find_record(&mut self, key: impl Into<ResourceKey>, options: FindOptions) -> Deferred<RecordHandle> {
        self.assert_alive();
        let key = key.into();
        assert!(
            key.id.is_some() || key.lid.is_some(),
            "find_record requires an id or a lid, got {}",
            key
        );
        let identifier = self.identifier_for(key);
        if let Some(preload) = &options.preload {
            self.preload(&identifier, preload);
        }
        self.find_by_identifier(&identifier, options)
    }

    fn find_by_identifier(&mut self, identifier: &RecordIdentifier, options: FindOptions) -> Deferred<RecordHandle> {
        let model = self.ensure_model(identifier);
        if !model.is_loaded() {
            return self.fetch_record(identifier, options);
        }
        let record = model.record();
        if model.is_new() {
            return Deferred::resolved(record);
        }
        if options.reload {
            return self.fetch_record(identifier, options);
        }

        let adapter = self.registry.adapter_for(identifier.kind());
        let (reload, background) = {
            let snapshot = self.snapshot(identifier, SnapshotOptions::from(&options));
            let reload = adapter.should_reload_record(&snapshot);
            let background = !reload
                && options
                    .background_reload
                    .unwrap_or_else(|| adapter.should_background_reload_record(&snapshot));
            (reload, background)
        };

        if reload {
            return self.fetch_record(identifier, options);
        }
        if background {
            trace!(%identifier, "background reload");
            self.fetch_record(identifier, options);
        }
        Deferred::resolved(record)
    }

    /// Find several records of one type. Fetches coalesce like
    /// [`find_record`](Self::find_record).
    pub fn find_many<I, S>(&mut self, kind: &str, ids: I) -> Deferred<Vec<RecordHandle>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deferreds = ids
            .into_iter()
            .map(|id| self.find_record(ResourceKey::new(kind, id), FindOptions::default()))
            .collect();
        Deferred::join_all(deferreds)
    }

    /// The cached record, if it is loaded. Never triggers a request.
    pub fn peek_record(&mut self, key: impl Into<ResourceKey>) -> Option<RecordHandle> {
        self.assert_alive();
        let identifier = self.identifiers.peek_record_identifier(&key.into())?;
        let model = self.model_mut(&identifier)?;
        if !model.is_loaded() {
            return None;
        }
        Some(model.record())
    }

    pub fn has_record_for_id(&self, kind: &str, id: &str) -> bool {
        self.identifiers
            .peek_record_identifier(&ResourceKey::new(kind, id))
            .and_then(|identifier| self.model(&identifier))
            .is_some_and(|model| model.is_loaded())
    }

    /// Queue a fetch of `identifier`, joining one already pending.
    pub(crate) fn fetch_record(&mut self, identifier: &RecordIdentifier, options: FindOptions) -> Deferred<RecordHandle> {
        if let Some(pending) = self.fetch.pending_fetch(identifier.lid()) {
            return pending;
        }
        assert!(identifier.id().is_some(), "cannot fetch {} without an id", identifier);

        let model = self.ensure_model(identifier);
        if model.is_loaded() {
            model.set_reloading(true);
        } else if !model.state().is_loading() {
            if let Err(error) = self.transition(identifier, RecordEvent::LoadingData) {
                return Deferred::rejected(error);
            }
        }

        let (deferred, first) = self.fetch.schedule_fetch(identifier, options);
        if first {
            self.scheduler.schedule_flush(Flush::Fetches);
        }
        deferred
    }

    /// Apply `preload` to a record before it is fetched.
    fn preload(&mut self, identifier: &RecordIdentifier, preload: &Map<String, Value>) {
        let model = self.schema.model_for(identifier.kind()).clone();
        let mut resource = ResourceObject {
            kind: identifier.kind().to_string(),
            id: identifier.id().map(str::to_string),
            lid: Some(identifier.lid().clone()),
            attributes: None,
            relationships: None,
            meta: None,
            links: None,
        };

        for (key, value) in preload {
            if model.has_attribute(key) {
                resource = resource.with_attribute(key.clone(), value.clone());
                continue;
            }
            let Some(relationship) = model.relationship(key) else {
                continue;
            };
            let reference = |value: &Value| {
                let id = match value {
                    Value::String(id) => id.clone(),
                    Value::Number(id) => id.to_string(),
                    _ => return None,
                };
                Some(ResourceRef::new(relationship.related.clone(), id))
            };
            let linkage = match (relationship.kind, value) {
                (RelationshipKind::HasMany, Value::Array(values)) => {
                    Linkage::Many(values.iter().filter_map(reference).collect())
                }
                (RelationshipKind::HasMany, _) => continue,
                (RelationshipKind::BelongsTo, value) => Linkage::One(reference(value)),
            };
            resource = resource.with_relationship(
                key.clone(),
                RelationshipObject {
                    data: Some(linkage),
                    links: None,
                    meta: None,
                },
            );
        }

        let relationships = self.relationship_states(&resource);
        let model = self.ensure_model(identifier);
        model
            .data_mut()
            .push_data(resource.attributes.as_ref(), relationships);
        trace!(%identifier, "preloaded record data");
    }

    pub(super) fn flush_fetches(&mut self) {
        for (kind, items) in self.fetch.take_fetches() {
            self.fetch_batch(&kind, items);
        }
    }

    fn fetch_batch(&mut self, kind: &str, items: Vec<PendingFetchItem>) {
        let adapter = self.registry.adapter_for(kind);
        let coalesce = items.len() > 1 && adapter.coalesce_find_requests() && adapter.supports_find_many();
        if !coalesce {
            for item in items {
                self.fetch_single(&adapter, kind, item);
            }
            return;
        }

        let groups: Vec<Vec<Lid>> = {
            let snapshots: Vec<Snapshot<'_>> = items
                .iter()
                .map(|item| self.snapshot(&item.identifier, SnapshotOptions::from(&item.options)))
                .collect();
            adapter
                .group_records_for_find_many(snapshots)
                .iter()
                .map(|group| group.iter().map(|snapshot| snapshot.lid().clone()).collect())
                .collect()
        };

        let mut remaining: IndexMap<Lid, PendingFetchItem> = items
            .into_iter()
            .map(|item| (item.identifier.lid().clone(), item))
            .collect();
        for group in groups {
            let mut batch: Vec<PendingFetchItem> = group
                .iter()
                .filter_map(|lid| remaining.shift_remove(lid))
                .collect();
            if batch.len() > 1 {
                self.fetch_group(&adapter, kind, batch);
            } else if let Some(item) = batch.pop() {
                self.fetch_single(&adapter, kind, item);
            }
        }
        for (_, item) in remaining {
            self.fetch_single(&adapter, kind, item);
        }
    }

    /// The identifier an item should be fetched under, or `None` (after
    /// rejecting it) when the record is gone.
    fn current_fetch_identifier(&self, item: &PendingFetchItem) -> Option<RecordIdentifier> {
        match self.identifiers.resolve(item.identifier.lid()) {
            Some(current) if current.id().is_some() => Some(current.clone()),
            _ => {
                item.deferred
                    .reject(StoreError::Unloaded(item.identifier.clone()));
                None
            }
        }
    }

    fn fetch_single(&mut self, adapter: &Rc<dyn Adapter>, kind: &str, item: PendingFetchItem) {
        let Some(identifier) = self.current_fetch_identifier(&item) else {
            return;
        };
        let id = identifier.id().unwrap_or_default().to_string();

        let payload = {
            let snapshot = self.snapshot(&identifier, SnapshotOptions::from(&item.options));
            adapter.find_record(kind, &id, &snapshot)
        };
        let document = payload
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(kind, payload, Some(&id), RequestType::FindRecord));

        match document {
            Ok(document) => self.did_fetch_record(&identifier, &id, &document, item.deferred),
            Err(error) => self.did_fail_fetch(&identifier, error, &item.deferred),
        }
    }

    fn did_fetch_record(
        &mut self,
        identifier: &RecordIdentifier,
        id: &str,
        document: &NormalizedDocument,
        deferred: Deferred<RecordHandle>,
    ) {
        let returned = document.primary().first().map(|primary| primary.id.clone());
        if let Some(returned) = returned {
            if returned.as_deref() != Some(id) {
                self.diagnostic(
                    DiagnosticKind::MismatchedId,
                    format!(
                        "requested a record of type '{}' with id '{}' but the adapter returned a payload with primary data having an id of '{}'",
                        identifier.kind(),
                        id,
                        returned.as_deref().unwrap_or("null")
                    ),
                );
            }
        }

        if let Err(error) = self.push_document(document) {
            self.did_fail_fetch(identifier, error, &deferred);
            return;
        }
        self.finish_fetch(identifier, deferred);
    }

    fn fetch_group(&mut self, adapter: &Rc<dyn Adapter>, kind: &str, items: Vec<PendingFetchItem>) {
        let mut live = Vec::with_capacity(items.len());
        for mut item in items {
            if let Some(identifier) = self.current_fetch_identifier(&item) {
                item.identifier = identifier;
                live.push(item);
            }
        }
        if live.len() < 2 {
            for item in live {
                self.fetch_single(adapter, kind, item);
            }
            return;
        }

        let ids: Vec<String> = live
            .iter()
            .filter_map(|item| item.identifier.id().map(str::to_string))
            .collect();
        let payload = {
            let snapshots: Vec<Snapshot<'_>> = live
                .iter()
                .map(|item| self.snapshot(&item.identifier, SnapshotOptions::from(&item.options)))
                .collect();
            adapter.find_many(kind, &ids, &snapshots)
        };
        debug!(kind, count = ids.len(), "coalesced fetch");

        let pushed = payload
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(kind, payload, None, RequestType::FindMany))
            .and_then(|document| self.push_document(&document));
        let returned: HashSet<Lid> = match pushed {
            Ok(identifiers) => identifiers
                .iter()
                .map(|identifier| identifier.lid().clone())
                .collect(),
            Err(error) => {
                for item in live {
                    self.did_fail_fetch(&item.identifier, error.clone(), &item.deferred);
                }
                return;
            }
        };

        let (found, missing) = partition_response(live, &returned);
        for item in found {
            self.finish_fetch(&item.identifier, item.deferred);
        }
        if missing.is_empty() {
            return;
        }

        let missing_ids: Vec<String> = missing
            .iter()
            .map(|item| format!("\"{}\"", item.identifier.id().unwrap_or_default()))
            .collect();
        self.diagnostic(
            DiagnosticKind::MissingFromPayload,
            format!(
                "expected to find records of type '{}' with the following ids in the adapter response but they were missing: [ {} ]",
                kind,
                missing_ids.join(", ")
            ),
        );
        for item in missing {
            self.not_found(&item.identifier);
            item.deferred
                .reject(StoreError::MissingFromPayload(item.identifier));
        }
    }

    /// Resolve with the record if the response loaded it.
    fn finish_fetch(&mut self, identifier: &RecordIdentifier, deferred: Deferred<RecordHandle>) {
        match self.model_mut(identifier) {
            Some(model) if model.is_loaded() => {
                model.set_reloading(false);
                deferred.resolve(model.record());
            }
            _ => {
                self.not_found(identifier);
                deferred.reject(StoreError::RecordNotFound(identifier.to_string()));
            }
        }
    }

    /// The response did not contain a record we were loading: forget it.
    fn not_found(&mut self, identifier: &RecordIdentifier) {
        let loading = self
            .model(identifier)
            .is_some_and(|model| model.state().is_loading());
        if !loading {
            if let Some(model) = self.model_mut(identifier) {
                model.set_reloading(false);
            }
            return;
        }
        if self.transition(identifier, RecordEvent::NotFound).is_ok() {
            if let Err(error) = self.unload_internal(identifier) {
                trace!(%identifier, %error, "could not unload missing record");
            }
        }
    }

    fn did_fail_fetch(&mut self, identifier: &RecordIdentifier, error: StoreError, deferred: &Deferred<RecordHandle>) {
        let never_loaded = match self.model_mut(identifier) {
            Some(model) => {
                model.set_reloading(false);
                !model.is_loaded()
            }
            None => false,
        };

        if never_loaded {
            self.diagnostic(
                DiagnosticKind::FetchFailed,
                format!("fetching {} failed: {}", identifier, error),
            );
            if let Err(transition) = self.transition(identifier, RecordEvent::BecameError) {
                trace!(%identifier, error = %transition, "fetch failure left state unchanged");
            }
            if let Err(unload) = self.unload_internal(identifier) {
                trace!(%identifier, error = %unload, "could not unload failed record");
            }
        }
        deferred.reject(error);
    }
}

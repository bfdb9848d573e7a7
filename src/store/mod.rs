//! The public façade over the identity cache, identity map, fetch manager,
//! record arrays and notifications.
//!
//! Everything runs on one thread. Operations that reach an adapter return a
//! [`Deferred`] and queue work; [`Store::flush`] drains the queue, which is
//! where coalescing happens. Tests and callers that want a value right away
//! use [`Store::settle`].

mod arrays;
mod builder;
mod find;
mod push;
mod record;
mod reference;
mod relationships;
mod save;

use tracing::debug;

use crate::deferred::Deferred;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{Result, StoreError};
use crate::fetch::{FetchManager, SnapshotOptions, StoreRequest};
use crate::identifier::{IdentifierUpdate, IdentityCache, RecordIdentifier, ResourceKey};
use crate::identity_map::IdentityMap;
use crate::notification::{NotificationKind, NotificationManager, SubscriptionToken};
use crate::record::{InternalModel, RecordEvent, RecordState};
use crate::record_array::{ArrayChanges, RecordArrayManager};
use crate::registry::Registry;
use crate::scheduler::{Flush, Scheduler, Task};
use crate::schema::Schema;
use crate::snapshot::{Snapshot, SnapshotSource};

pub use builder::{StoreBuilder, StoreConfig};
pub use push::Pushed;
pub use reference::RecordReference;

pub struct Store {
    config: StoreConfig,
    schema: Schema,
    registry: Registry,
    identifiers: IdentityCache,
    models: IdentityMap,
    fetch: FetchManager,
    arrays: RecordArrayManager,
    notifications: NotificationManager,
    scheduler: Scheduler,
    diagnostics: Diagnostics,
    destroyed: bool,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn from_parts(config: StoreConfig, schema: Schema, registry: Registry) -> Self {
        Store {
            identifiers: IdentityCache::new(config.lid_prefix.clone()),
            diagnostics: Diagnostics::new(config.diagnostics_capacity),
            config,
            schema,
            registry,
            models: IdentityMap::new(),
            fetch: FetchManager::new(),
            arrays: RecordArrayManager::new(),
            notifications: NotificationManager::new(),
            scheduler: Scheduler::new(),
            destroyed: false,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn identifier_cache(&self) -> &IdentityCache {
        &self.identifiers
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.models
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn assert_alive(&self) {
        assert!(!self.destroyed, "attempted to use a destroyed store");
    }

    pub(crate) fn source(&self) -> SnapshotSource<'_> {
        SnapshotSource {
            identifiers: &self.identifiers,
            models: &self.models,
            schema: &self.schema,
            registry: &self.registry,
        }
    }

    pub(crate) fn snapshot(&self, identifier: &RecordIdentifier, options: SnapshotOptions) -> Snapshot<'_> {
        Snapshot::new(identifier, self.source(), options)
    }

    /// The identifier for `key`, created if needed.
    ///
    /// # Panics
    ///
    /// When a new identifier would be created for an unknown type, or for a
    /// key without a type.
    pub fn identifier_for(&mut self, key: impl Into<ResourceKey>) -> RecordIdentifier {
        self.assert_alive();
        let key = key.into();
        if let Some(existing) = self.identifiers.peek_record_identifier(&key) {
            if existing.id().is_none() && key.id.is_some() {
                return self.update_identifier(&existing, &key);
            }
            return existing;
        }
        if let Some(kind) = key.kind.as_deref() {
            self.schema.model_for(kind);
        }
        self.identifiers.get_or_create_record_identifier(&key)
    }

    pub fn peek_identifier(&self, key: impl Into<ResourceKey>) -> Option<RecordIdentifier> {
        self.identifiers.peek_record_identifier(&key.into())
    }

    /// A known identifier, or `RecordNotFound`.
    fn existing(&self, key: impl Into<ResourceKey>) -> Result<RecordIdentifier> {
        let key = key.into();
        self.identifiers
            .peek_record_identifier(&key)
            .ok_or_else(|| StoreError::RecordNotFound(key.to_string()))
    }

    /// Apply what the server said about `identifier`, following merges
    /// through every table that keys on it.
    pub(crate) fn update_identifier(&mut self, identifier: &RecordIdentifier, key: &ResourceKey) -> RecordIdentifier {
        match self.identifiers.update_record_identifier(identifier, key) {
            IdentifierUpdate::Unchanged(current) => current,
            IdentifierUpdate::IdAssigned(current) => {
                if let Some(model) = self.models.get_mut(current.kind(), current.lid()) {
                    model.set_identifier(current.clone());
                }
                self.notify(&current, NotificationKind::Identity, None);
                current
            }
            IdentifierUpdate::Merged { kept, abandoned } => {
                self.merge(&kept, &abandoned);
                kept
            }
        }
    }

    fn merge(&mut self, kept: &RecordIdentifier, abandoned: &RecordIdentifier) {
        let kind = kept.kind();
        let duplicate = self.models.remove(kind, abandoned.lid());
        match (self.models.get_mut(kind, kept.lid()), duplicate) {
            (Some(model), Some(mut duplicate)) => {
                model.set_identifier(kept.clone());
                if let Some(record) = duplicate.take_record() {
                    assert!(
                        !model.has_record(),
                        "cannot merge {} into {}: both records were materialized",
                        abandoned.lid(),
                        kept
                    );
                    model.adopt_record(record);
                }
            }
            (Some(model), None) => model.set_identifier(kept.clone()),
            (None, Some(mut duplicate)) => {
                duplicate.set_identifier(kept.clone());
                self.models.insert(duplicate);
            }
            (None, None) => {}
        }

        let changes = self.arrays.rename(abandoned.lid(), kept.lid());
        self.apply_array_changes(changes);
        self.notifications.repoint(abandoned.lid(), kept.lid());
        self.fetch.repoint(abandoned.lid(), kept);
        debug!(%kept, abandoned = %abandoned.lid(), "merged records");
        self.notify(kept, NotificationKind::Identity, None);
    }

    pub(crate) fn model(&self, identifier: &RecordIdentifier) -> Option<&InternalModel> {
        let current = self.identifiers.resolve(identifier.lid())?;
        self.models.get(current.kind(), current.lid())
    }

    pub(crate) fn model_mut(&mut self, identifier: &RecordIdentifier) -> Option<&mut InternalModel> {
        let current = self.identifiers.resolve(identifier.lid())?;
        self.models.get_mut(current.kind(), current.lid())
    }

    /// The model for `identifier`, registering an empty one if needed.
    pub(crate) fn ensure_model(&mut self, identifier: &RecordIdentifier) -> &mut InternalModel {
        self.models.get_or_insert(identifier)
    }

    pub(crate) fn transition(&mut self, identifier: &RecordIdentifier, event: RecordEvent) -> Result<RecordState> {
        let model = self
            .model_mut(identifier)
            .ok_or_else(|| StoreError::Unloaded(identifier.clone()))?;
        let before = model.state();
        let after = model.send(event)?;
        if before != after {
            self.state_did_change(identifier);
        }
        Ok(after)
    }

    pub(crate) fn state_did_change(&mut self, identifier: &RecordIdentifier) {
        self.notify(identifier, NotificationKind::State, None);
        self.record_did_change(identifier);
    }

    pub(crate) fn record_did_change(&mut self, identifier: &RecordIdentifier) {
        if self.arrays.record_did_change(identifier) {
            self.scheduler.schedule_flush(Flush::RecordArrays);
        }
    }

    /// Keep each model's array back-references in step with membership.
    pub(crate) fn apply_array_changes(&mut self, changes: ArrayChanges) {
        for (array, change) in changes {
            let Some(kind) = self.arrays.get(array).map(|array| array.kind().to_string()) else {
                continue;
            };
            for lid in &change.added {
                if let Some(model) = self.models.get_mut(&kind, lid) {
                    model.add_to_record_array(array);
                }
            }
            for lid in &change.removed {
                if let Some(model) = self.models.get_mut(&kind, lid) {
                    model.remove_from_record_array(array);
                }
            }
        }
    }

    pub(crate) fn notify(&mut self, identifier: &RecordIdentifier, kind: NotificationKind, key: Option<&str>) {
        self.notifications.notify(identifier, kind, key);
    }

    pub(crate) fn diagnostic(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics.record(kind, message);
    }

    /// Run queued work until nothing is left.
    pub fn flush(&mut self) {
        self.assert_alive();
        while let Some(task) = self.scheduler.next() {
            match task {
                Task::Flush(Flush::Fetches) => self.flush_fetches(),
                Task::Flush(Flush::Saves) => self.flush_saves(),
                Task::Flush(Flush::RecordArrays) => self.flush_record_arrays(),
                Task::Request(request) => self.run_request(request),
            }
        }
    }

    /// Flush, then read the outcome of `deferred`.
    pub fn settle<T: Clone>(&mut self, deferred: &Deferred<T>) -> Result<T> {
        if !self.destroyed {
            self.flush();
        }
        deferred.result().unwrap_or(Err(StoreError::Unsettled))
    }

    pub fn has_pending_work(&self) -> bool {
        !self.scheduler.is_idle()
    }

    fn flush_record_arrays(&mut self) {
        let changes = self.arrays.flush(&self.models);
        self.apply_array_changes(changes);
    }

    fn run_request(&mut self, request: StoreRequest) {
        match request {
            StoreRequest::FindAll {
                kind,
                array,
                options,
                deferred,
            } => self.run_find_all(&kind, array, options, deferred),
            StoreRequest::Query {
                kind,
                array,
                query,
                options,
                deferred,
            } => self.run_query(&kind, array, query, options, deferred),
            StoreRequest::QueryRecord {
                kind,
                query,
                options,
                deferred,
            } => self.run_query_record(&kind, query, options, deferred),
            StoreRequest::FindHasMany {
                owner,
                key,
                url,
                deferred,
            } => self.run_find_has_many(&owner, &key, &url, deferred),
            StoreRequest::FindBelongsTo {
                owner,
                key,
                url,
                deferred,
            } => self.run_find_belongs_to(&owner, &key, &url, deferred),
        }
    }

    /// Call `callback` whenever the record behind `key` changes.
    pub fn subscribe(
        &mut self,
        key: impl Into<ResourceKey>,
        callback: impl FnMut(&RecordIdentifier, NotificationKind, Option<&str>) + 'static,
    ) -> Result<SubscriptionToken> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        Ok(self.notifications.subscribe(&identifier, callback))
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.notifications.unsubscribe(token)
    }

    /// Recent warnings about adapter responses, oldest first.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.entries().cloned().collect()
    }

    /// Tear the store down. Pending requests reject with
    /// [`StoreError::StoreDestroyed`]; any later use panics.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let error = StoreError::StoreDestroyed;
        self.fetch.reject_all(&error);
        for request in self.scheduler.drain_requests() {
            request.reject(error.clone());
        }
        self.arrays.clear();
        self.notifications.clear();
        self.models.clear();
        self.identifiers.clear();
        self.destroyed = true;
        debug!("store destroyed");
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("records", &self.models.len())
            .field("arrays", &self.arrays.len())
            .field("pending", &self.scheduler.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

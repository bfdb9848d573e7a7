use serde_json::Value;
use tracing::trace;

use super::Store;
use crate::adapter::RequestType;
use crate::deferred::Deferred;
use crate::error::{Result, StoreError};
use crate::fetch::{FindAllOptions, RequestOptions, SnapshotOptions, StoreRequest};
use crate::identifier::Lid;
use crate::record::RecordHandle;
use crate::record_array::{ArrayChange, ArrayId, ArraySource, ObserverId, RecordArray};
use crate::snapshot::SnapshotRecordArray;

impl Store {
    /// The live array of every loaded record of `kind`. Never triggers a
    /// request.
    ///
    /// # Panics
    ///
    /// When `kind` is unknown.
    pub fn peek_all(&mut self, kind: &str) -> ArrayId {
        self.assert_alive();
        self.schema.model_for(kind);
        let (id, changes) = self.arrays.live_record_array_for(kind, &self.models);
        self.apply_array_changes(changes);
        id
    }

    /// The live array of `kind`, fetched from the adapter when it asks for a
    /// reload (by default, when the array is empty) and otherwise refreshed
    /// in the background.
    pub fn find_all(&mut self, kind: &str, options: FindAllOptions) -> Deferred<ArrayId> {
        let id = self.peek_all(kind);
        if options.reload {
            return self.schedule_find_all(kind, id, options);
        }

        let adapter = self.registry.adapter_for(kind);
        let (reload, background) = {
            let snapshot = self.snapshot_record_array(id, SnapshotOptions::from(&options));
            let reload = adapter.should_reload_all(&snapshot);
            let background = !reload
                && options
                    .background_reload
                    .unwrap_or_else(|| adapter.should_background_reload_all(&snapshot));
            (reload, background)
        };

        if reload {
            return self.schedule_find_all(kind, id, options);
        }
        if background {
            trace!(kind, "background reload of all records");
            self.schedule_find_all(kind, id, options);
        }
        Deferred::resolved(id)
    }

    fn schedule_find_all(&mut self, kind: &str, array: ArrayId, options: FindAllOptions) -> Deferred<ArrayId> {
        if let Some(array) = self.arrays.get_mut(array) {
            array.set_updating(true);
        }
        let deferred = Deferred::new();
        self.scheduler.schedule(StoreRequest::FindAll {
            kind: kind.to_string(),
            array,
            options,
            deferred: deferred.clone(),
        });
        deferred
    }

    fn snapshot_record_array(&self, id: ArrayId, options: SnapshotOptions) -> SnapshotRecordArray<'_> {
        let (kind, lids, meta) = match self.arrays.get(id) {
            Some(array) => (
                array.kind().to_string(),
                array.lids().cloned().collect::<Vec<Lid>>(),
                array.meta().cloned(),
            ),
            None => (String::new(), Vec::new(), None),
        };
        SnapshotRecordArray::new(&kind, lids, meta, options, self.source())
    }

    /// Ask the adapter for records matching `query`. The result is a new
    /// array the store does not keep in sync with the cache.
    pub fn query(&mut self, kind: &str, query: Value, options: RequestOptions) -> Deferred<ArrayId> {
        self.assert_alive();
        self.schema.model_for(kind);
        let array = self
            .arrays
            .create_adapter_populated_record_array(kind, Some(query.clone()));
        let deferred = Deferred::new();
        self.scheduler.schedule(StoreRequest::Query {
            kind: kind.to_string(),
            array,
            query,
            options,
            deferred: deferred.clone(),
        });
        deferred
    }

    /// Ask the adapter for the single record matching `query`.
    pub fn query_record(&mut self, kind: &str, query: Value, options: RequestOptions) -> Deferred<Option<RecordHandle>> {
        self.assert_alive();
        self.schema.model_for(kind);
        let deferred = Deferred::new();
        self.scheduler.schedule(StoreRequest::QueryRecord {
            kind: kind.to_string(),
            query,
            options,
            deferred: deferred.clone(),
        });
        deferred
    }

    /// Refresh an array: live arrays reload every record of their type,
    /// query arrays re-run their query.
    pub fn update_record_array(&mut self, id: ArrayId) -> Deferred<ArrayId> {
        self.assert_alive();
        let Some(array) = self.arrays.get_mut(id) else {
            return Deferred::rejected(StoreError::ArrayDestroyed(id));
        };
        let kind = array.kind().to_string();
        match array.source().clone() {
            ArraySource::Live => self.schedule_find_all(&kind, id, FindAllOptions::new().reload()),
            ArraySource::AdapterPopulated { query } => {
                array.set_updating(true);
                let deferred = Deferred::new();
                self.scheduler.schedule(StoreRequest::Query {
                    kind,
                    array: id,
                    query: query.unwrap_or(Value::Null),
                    options: RequestOptions::default(),
                    deferred: deferred.clone(),
                });
                deferred
            }
        }
    }

    pub fn record_array(&self, id: ArrayId) -> Option<&RecordArray> {
        self.arrays.get(id)
    }

    /// The records of an array, in order.
    pub fn records(&mut self, id: ArrayId) -> Vec<RecordHandle> {
        let Some(array) = self.arrays.get(id) else {
            return Vec::new();
        };
        let kind = array.kind().to_string();
        let lids: Vec<Lid> = array.lids().cloned().collect();
        let mut records = Vec::with_capacity(lids.len());
        for lid in &lids {
            if let Some(model) = self.models.get_mut(&kind, lid) {
                records.push(model.record());
            }
        }
        records
    }

    /// Call `observer` with every membership change of the array.
    pub fn observe_record_array(&mut self, id: ArrayId, observer: impl FnMut(&ArrayChange) + 'static) -> ObserverId {
        self.arrays.subscribe(id, observer)
    }

    pub fn unobserve_record_array(&mut self, observer: ObserverId) -> bool {
        self.arrays.unsubscribe(observer)
    }

    /// Drop an array. A destroyed live array is recreated by the next
    /// [`peek_all`](Self::peek_all).
    pub fn destroy_record_array(&mut self, id: ArrayId) -> bool {
        let Some(array) = self.arrays.destroy_array(id) else {
            return false;
        };
        for lid in array.lids() {
            if let Some(model) = self.models.get_mut(array.kind(), lid) {
                model.remove_from_record_array(id);
            }
        }
        true
    }

    fn array_or_reject<T>(&self, id: ArrayId, deferred: &Deferred<T>) -> Option<&RecordArray> {
        let array = self.arrays.get(id);
        if array.is_none() {
            deferred.reject(StoreError::ArrayDestroyed(id));
        }
        array
    }

    pub(super) fn run_find_all(&mut self, kind: &str, array: ArrayId, options: FindAllOptions, deferred: Deferred<ArrayId>) {
        if self.array_or_reject(array, &deferred).is_none() {
            return;
        }
        let adapter = self.registry.adapter_for(kind);
        let payload = {
            let snapshot = self.snapshot_record_array(array, SnapshotOptions::from(&options));
            adapter.find_all(kind, None, &snapshot)
        };

        let pushed = payload
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(kind, payload, None, RequestType::FindAll))
            .and_then(|document| self.push_document(&document));
        match pushed {
            Ok(identifiers) => {
                let changes = self.arrays.flush_kind(kind, &self.models);
                self.apply_array_changes(changes);
                if let Some(array) = self.arrays.get_mut(array) {
                    array.set_loaded();
                }
                trace!(kind, count = identifiers.len(), "loaded all records");
                deferred.resolve(array);
            }
            Err(error) => {
                if let Some(array) = self.arrays.get_mut(array) {
                    array.set_updating(false);
                }
                deferred.reject(error);
            }
        }
    }

    pub(super) fn run_query(
        &mut self,
        kind: &str,
        array: ArrayId,
        query: Value,
        options: RequestOptions,
        deferred: Deferred<ArrayId>,
    ) {
        let Some(record_array) = self.array_or_reject(array, &deferred) else {
            return;
        };
        let adapter = self.registry.adapter_for(kind);
        let payload = adapter.query(kind, &query, record_array, &options);

        let result = payload
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(kind, payload, None, RequestType::Query))
            .and_then(|document| {
                let identifiers = self.push_document(&document)?;
                Ok((document, identifiers))
            });
        match result {
            Ok((document, identifiers)) => {
                let lids: Vec<Lid> = identifiers
                    .iter()
                    .map(|identifier| identifier.lid().clone())
                    .collect();
                let changes = self.arrays.populate(array, &lids, document.meta, document.links);
                self.apply_array_changes(changes);
                trace!(kind, array = %array, count = lids.len(), "populated query array");
                deferred.resolve(array);
            }
            Err(error) => {
                if let Some(array) = self.arrays.get_mut(array) {
                    array.set_updating(false);
                }
                deferred.reject(error);
            }
        }
    }

    pub(super) fn run_query_record(
        &mut self,
        kind: &str,
        query: Value,
        options: RequestOptions,
        deferred: Deferred<Option<RecordHandle>>,
    ) {
        let adapter = self.registry.adapter_for(kind);
        let pushed: Result<_> = adapter
            .query_record(kind, &query, &options)
            .map_err(StoreError::from)
            .and_then(|payload| self.normalize_response(kind, payload, None, RequestType::QueryRecord))
            .and_then(|document| self.push_document(&document));
        match pushed {
            Ok(identifiers) => {
                let record = identifiers
                    .first()
                    .and_then(|identifier| self.loaded_record(identifier.lid()));
                deferred.resolve(record);
            }
            Err(error) => {
                deferred.reject(error);
            }
        }
    }
}

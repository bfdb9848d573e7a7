//! Pending fetches and saves.
//!
//! Every `find_record` for a record that is not loaded lands here. Requests
//! made during the same turn are queued per type and flushed together, so
//! concurrent callers for one identifier share a single [`Deferred`] and a
//! single adapter call. Saves queue the same way, one entry per record.

mod options;
mod request;

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::deferred::Deferred;
use crate::error::StoreError;
use crate::identifier::{Lid, RecordIdentifier};
use crate::record::RecordHandle;

pub use options::{FindAllOptions, FindOptions, RequestOptions, SnapshotOptions};
pub use request::StoreRequest;

/// One identifier waiting for the next fetch flush.
#[derive(Debug)]
pub struct PendingFetchItem {
    pub identifier: RecordIdentifier,
    pub deferred: Deferred<RecordHandle>,
    pub options: FindOptions,
}

/// One record waiting for the next save flush.
#[derive(Debug)]
pub struct PendingSaveItem {
    pub identifier: RecordIdentifier,
    pub deferred: Deferred<RecordHandle>,
    pub options: RequestOptions,
}

/// Queues of pending fetches (grouped by type) and saves.
#[derive(Debug, Default)]
pub struct FetchManager {
    fetches: IndexMap<String, IndexMap<Lid, PendingFetchItem>>,
    saves: IndexMap<Lid, PendingSaveItem>,
}

impl FetchManager {
    pub fn new() -> Self {
        FetchManager::default()
    }

    /// Queue a fetch of `identifier`.
    ///
    /// Returns the shared deferred and whether this is the first fetch queued
    /// since the last flush (the caller schedules the flush).
    pub fn schedule_fetch(
        &mut self,
        identifier: &RecordIdentifier,
        options: FindOptions,
    ) -> (Deferred<RecordHandle>, bool) {
        if let Some(pending) = self.pending_fetch(identifier.lid()) {
            trace!(%identifier, "joined pending fetch");
            return (pending, false);
        }

        let first = self.fetches.is_empty();
        let deferred = Deferred::new();
        self.fetches
            .entry(identifier.kind().to_string())
            .or_default()
            .insert(
                identifier.lid().clone(),
                PendingFetchItem {
                    identifier: identifier.clone(),
                    deferred: deferred.clone(),
                    options,
                },
            );
        trace!(%identifier, "scheduled fetch");
        (deferred, first)
    }

    pub fn pending_fetch(&self, lid: &Lid) -> Option<Deferred<RecordHandle>> {
        self.fetches
            .values()
            .find_map(|items| items.get(lid))
            .map(|item| item.deferred.clone())
    }

    pub fn has_pending_fetches(&self) -> bool {
        !self.fetches.is_empty()
    }

    /// Drain the fetch queue, grouped by type in first-request order.
    pub fn take_fetches(&mut self) -> IndexMap<String, Vec<PendingFetchItem>> {
        std::mem::take(&mut self.fetches)
            .into_iter()
            .map(|(kind, items)| (kind, items.into_values().collect()))
            .collect()
    }

    /// Queue a save. A record already queued shares the existing deferred.
    pub fn schedule_save(
        &mut self,
        identifier: &RecordIdentifier,
        options: RequestOptions,
    ) -> (Deferred<RecordHandle>, bool) {
        if let Some(pending) = self.saves.get(identifier.lid()) {
            return (pending.deferred.clone(), false);
        }

        let first = self.saves.is_empty();
        let deferred = Deferred::new();
        self.saves.insert(
            identifier.lid().clone(),
            PendingSaveItem {
                identifier: identifier.clone(),
                deferred: deferred.clone(),
                options,
            },
        );
        trace!(%identifier, "scheduled save");
        (deferred, first)
    }

    pub fn has_pending_saves(&self) -> bool {
        !self.saves.is_empty()
    }

    pub fn take_saves(&mut self) -> Vec<PendingSaveItem> {
        std::mem::take(&mut self.saves).into_values().collect()
    }

    /// Follow an identifier merge: entries for `abandoned` now belong to `kept`.
    pub fn repoint(&mut self, abandoned: &Lid, kept: &RecordIdentifier) {
        if let Some(items) = self.fetches.get_mut(kept.kind()) {
            if let Some(mut item) = items.shift_remove(abandoned) {
                match items.get(kept.lid()) {
                    Some(survivor) => forward(&survivor.deferred, &item.deferred),
                    None => {
                        item.identifier = kept.clone();
                        items.insert(kept.lid().clone(), item);
                    }
                }
            }
        }

        if let Some(mut item) = self.saves.shift_remove(abandoned) {
            match self.saves.get(kept.lid()) {
                Some(survivor) => forward(&survivor.deferred, &item.deferred),
                None => {
                    item.identifier = kept.clone();
                    self.saves.insert(kept.lid().clone(), item);
                }
            }
        }
    }

    /// Reject everything still queued.
    pub fn reject_all(&mut self, error: &StoreError) {
        for (_, items) in std::mem::take(&mut self.fetches) {
            for (_, item) in items {
                item.deferred.reject(error.clone());
            }
        }
        for (_, item) in std::mem::take(&mut self.saves) {
            item.deferred.reject(error.clone());
        }
    }
}

fn forward<T: Clone + 'static>(from: &Deferred<T>, to: &Deferred<T>) {
    let to = to.clone();
    from.on_settle(move |result| {
        to.settle(result.clone());
    });
}

/// Split the identifiers requested in one batch into those the response
/// covered and those it did not.
pub fn partition_response(
    requested: Vec<PendingFetchItem>,
    returned: &HashSet<Lid>,
) -> (Vec<PendingFetchItem>, Vec<PendingFetchItem>) {
    requested
        .into_iter()
        .partition(|item| returned.contains(item.identifier.lid()))
}

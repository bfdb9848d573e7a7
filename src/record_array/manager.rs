use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace};

use super::{ArrayChange, ArrayId, ArraySource, RecordArray};
use crate::document::Links;
use crate::identifier::{Lid, RecordIdentifier};
use crate::identity_map::IdentityMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&ArrayChange)>;

/// Owns every record array and keeps live arrays consistent with the
/// identity map.
///
/// Changes reported through [`record_did_change`](Self::record_did_change)
/// are batched per type and applied on [`flush`](Self::flush), so each array
/// observer sees one [`ArrayChange`] per flush.
#[derive(Default)]
pub struct RecordArrayManager {
    arrays: BTreeMap<ArrayId, RecordArray>,
    live: HashMap<String, ArrayId>,
    pending: IndexMap<String, IndexSet<Lid>>,
    observers: HashMap<ArrayId, Vec<(ObserverId, Observer)>>,
    next_array: u64,
    next_observer: u64,
}

/// Membership deltas produced by one operation, per array.
pub type ArrayChanges = Vec<(ArrayId, ArrayChange)>;

impl RecordArrayManager {
    pub fn new() -> Self {
        RecordArrayManager::default()
    }

    fn allocate(&mut self, kind: &str, source: ArraySource) -> ArrayId {
        self.next_array += 1;
        let id = ArrayId(self.next_array);
        self.arrays.insert(id, RecordArray::new(id, kind, source));
        id
    }

    pub fn get(&self, id: ArrayId) -> Option<&RecordArray> {
        self.arrays.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ArrayId) -> Option<&mut RecordArray> {
        self.arrays.get_mut(&id)
    }

    pub fn live_array_id(&self, kind: &str) -> Option<ArrayId> {
        self.live.get(kind).copied()
    }

    /// The live array for `kind`, created on first use and synced with any
    /// pending changes for the type.
    pub fn live_record_array_for(&mut self, kind: &str, models: &IdentityMap) -> (ArrayId, ArrayChanges) {
        if let Some(id) = self.live_array_id(kind) {
            return (id, self.flush_kind(kind, models));
        }

        let id = self.allocate(kind, ArraySource::Live);
        self.live.insert(kind.to_string(), id);
        self.pending.shift_remove(kind);

        let visible: Vec<Lid> = models
            .peek_map(kind)
            .map(|map| {
                map.models()
                    .filter(|model| model.is_visible())
                    .map(|model| model.identifier().lid().clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut changes = Vec::new();
        if let Some(array) = self.arrays.get_mut(&id) {
            array.set_loaded();
            let change = array.replace(&visible);
            if !change.is_empty() {
                changes.push((id, change));
            }
        }
        debug!(kind, array = %id, len = visible.len(), "created live record array");
        (id, changes)
    }

    /// A new, empty array awaiting an adapter response.
    pub fn create_adapter_populated_record_array(&mut self, kind: &str, query: Option<Value>) -> ArrayId {
        let id = self.allocate(kind, ArraySource::AdapterPopulated { query });
        if let Some(array) = self.arrays.get_mut(&id) {
            array.set_updating(true);
        }
        trace!(kind, array = %id, "created adapter populated record array");
        id
    }

    /// Replace an adapter-populated array's contents with a response.
    pub fn populate(
        &mut self,
        id: ArrayId,
        lids: &[Lid],
        meta: Option<Value>,
        links: Option<Links>,
    ) -> ArrayChanges {
        let Some(array) = self.arrays.get_mut(&id) else {
            return Vec::new();
        };
        let change = array.replace(lids);
        array.meta = meta;
        array.links = links;
        array.set_loaded();

        if change.is_empty() {
            return Vec::new();
        }
        self.notify(id, &change);
        vec![(id, change)]
    }

    /// Note that `identifier` may have entered or left its live array.
    ///
    /// Returns true when this is the first pending change since the last
    /// flush, meaning the caller must schedule one.
    pub fn record_did_change(&mut self, identifier: &RecordIdentifier) -> bool {
        if !self.live.contains_key(identifier.kind()) {
            return false;
        }
        let first = self.pending.is_empty();
        self.pending
            .entry(identifier.kind().to_string())
            .or_default()
            .insert(identifier.lid().clone());
        first
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply every pending change.
    pub fn flush(&mut self, models: &IdentityMap) -> ArrayChanges {
        let pending = std::mem::take(&mut self.pending);
        pending
            .into_iter()
            .filter_map(|(kind, lids)| self.sync(&kind, lids, models))
            .collect()
    }

    /// Apply pending changes for one type only.
    pub fn flush_kind(&mut self, kind: &str, models: &IdentityMap) -> ArrayChanges {
        match self.pending.shift_remove(kind) {
            Some(lids) => self.sync(kind, lids, models).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn sync(&mut self, kind: &str, lids: IndexSet<Lid>, models: &IdentityMap) -> Option<(ArrayId, ArrayChange)> {
        let id = self.live_array_id(kind)?;
        let array = self.arrays.get_mut(&id)?;

        let (added, removed): (Vec<Lid>, Vec<Lid>) = lids
            .into_iter()
            .partition(|lid| models.get(kind, lid).is_some_and(|model| model.is_visible()));
        let change = array.apply(&added, &removed);
        if change.is_empty() {
            return None;
        }

        trace!(
            kind,
            array = %id,
            added = change.added.len(),
            removed = change.removed.len(),
            "synced live record array"
        );
        self.notify(id, &change);
        Some((id, change))
    }

    /// Drop `lid` from adapter-populated arrays right away. Live arrays catch
    /// up on the next flush.
    pub fn remove_from_adapter_populated(
        &mut self,
        lid: &Lid,
        arrays: impl IntoIterator<Item = ArrayId>,
    ) -> ArrayChanges {
        let mut changes = Vec::new();
        for id in arrays {
            let Some(array) = self.arrays.get_mut(&id) else {
                continue;
            };
            if array.is_live() {
                continue;
            }
            let change = array.apply(&[], std::slice::from_ref(lid));
            if !change.is_empty() {
                self.notify(id, &change);
                changes.push((id, change));
            }
        }
        changes
    }

    /// Follow an identifier merge in every array and in pending changes.
    pub fn rename(&mut self, from: &Lid, to: &Lid) -> ArrayChanges {
        for lids in self.pending.values_mut() {
            if lids.shift_remove(from) {
                lids.insert(to.clone());
            }
        }

        let ids: Vec<ArrayId> = self
            .arrays
            .values()
            .filter(|array| array.contains(from))
            .map(RecordArray::id)
            .collect();

        let mut changes = Vec::new();
        for id in ids {
            let Some(array) = self.arrays.get_mut(&id) else {
                continue;
            };
            let change = array.rename(from, to);
            if !change.is_empty() {
                self.notify(id, &change);
                changes.push((id, change));
            }
        }
        changes
    }

    pub fn subscribe(&mut self, id: ArrayId, observer: impl FnMut(&ArrayChange) + 'static) -> ObserverId {
        self.next_observer += 1;
        let observer_id = ObserverId(self.next_observer);
        self.observers
            .entry(id)
            .or_default()
            .push((observer_id, Box::new(observer)));
        observer_id
    }

    pub fn unsubscribe(&mut self, observer: ObserverId) -> bool {
        for observers in self.observers.values_mut() {
            let before = observers.len();
            observers.retain(|(id, _)| *id != observer);
            if observers.len() != before {
                return true;
            }
        }
        false
    }

    fn notify(&mut self, id: ArrayId, change: &ArrayChange) {
        if let Some(observers) = self.observers.get_mut(&id) {
            for (_, observer) in observers.iter_mut() {
                observer(change);
            }
        }
    }

    /// Remove an array and its observers, returning it.
    pub fn destroy_array(&mut self, id: ArrayId) -> Option<RecordArray> {
        let array = self.arrays.remove(&id)?;
        if array.is_live() {
            self.live.remove(array.kind());
            self.pending.shift_remove(array.kind());
        }
        self.observers.remove(&id);
        Some(array)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
        self.live.clear();
        self.pending.clear();
        self.observers.clear();
    }
}

impl fmt::Debug for RecordArrayManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordArrayManager")
            .field("arrays", &self.arrays)
            .field("live", &self.live)
            .field("pending", &self.pending)
            .finish()
    }
}

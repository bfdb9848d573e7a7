//! Ordered, de-duplicated collections of record identifiers.
//!
//! A live array mirrors every visible record of one type and is kept in sync
//! by [`RecordArrayManager`]; an adapter-populated array holds exactly what a
//! query returned.

mod manager;

use std::fmt;

use indexmap::IndexSet;
use serde_json::Value;

use crate::document::Links;
use crate::identifier::Lid;

pub use manager::{ArrayChanges, ObserverId, RecordArrayManager};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array-{}", self.0)
    }
}

/// Where an array's membership comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ArraySource {
    /// Every visible record of the type.
    Live,
    /// The primary data of an adapter response.
    AdapterPopulated { query: Option<Value> },
}

/// Membership delta delivered to array observers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrayChange {
    pub added: Vec<Lid>,
    pub removed: Vec<Lid>,
}

impl ArrayChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct RecordArray {
    id: ArrayId,
    kind: String,
    source: ArraySource,
    members: IndexSet<Lid>,
    is_loaded: bool,
    is_updating: bool,
    meta: Option<Value>,
    links: Option<Links>,
}

impl RecordArray {
    fn new(id: ArrayId, kind: &str, source: ArraySource) -> Self {
        RecordArray {
            id,
            kind: kind.to_string(),
            source,
            members: IndexSet::new(),
            is_loaded: false,
            is_updating: false,
            meta: None,
            links: None,
        }
    }

    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// The record type this array holds.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> &ArraySource {
        &self.source
    }

    pub fn is_live(&self) -> bool {
        self.source == ArraySource::Live
    }

    pub fn query(&self) -> Option<&Value> {
        match &self.source {
            ArraySource::AdapterPopulated { query } => query.as_ref(),
            ArraySource::Live => None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, lid: &Lid) -> bool {
        self.members.contains(lid)
    }

    pub fn lids(&self) -> impl Iterator<Item = &Lid> {
        self.members.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Lid> {
        self.members.get_index(index)
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn links(&self) -> Option<&Links> {
        self.links.as_ref()
    }

    pub(crate) fn set_updating(&mut self, updating: bool) {
        self.is_updating = updating;
    }

    pub(crate) fn set_loaded(&mut self) {
        self.is_loaded = true;
        self.is_updating = false;
    }

    fn apply(&mut self, added: &[Lid], removed: &[Lid]) -> ArrayChange {
        let mut change = ArrayChange::default();
        for lid in removed {
            if self.members.shift_remove(lid) {
                change.removed.push(lid.clone());
            }
        }
        for lid in added {
            if self.members.insert(lid.clone()) {
                change.added.push(lid.clone());
            }
        }
        change
    }

    /// Replace the membership wholesale, keeping `lids` order.
    fn replace(&mut self, lids: &[Lid]) -> ArrayChange {
        let next: IndexSet<Lid> = lids.iter().cloned().collect();
        let change = ArrayChange {
            added: next.difference(&self.members).cloned().collect(),
            removed: self.members.difference(&next).cloned().collect(),
        };
        self.members = next;
        change
    }

    /// Swap `from` for `to` in place, or drop `from` when `to` is present.
    fn rename(&mut self, from: &Lid, to: &Lid) -> ArrayChange {
        let Some(index) = self.members.get_index_of(from) else {
            return ArrayChange::default();
        };
        let mut change = ArrayChange {
            added: Vec::new(),
            removed: vec![from.clone()],
        };
        if self.members.contains(to) {
            self.members.shift_remove_index(index);
        } else {
            let members: IndexSet<Lid> = self
                .members
                .iter()
                .map(|lid| if lid == from { to.clone() } else { lid.clone() })
                .collect();
            self.members = members;
            change.added.push(to.clone());
        }
        change
    }
}

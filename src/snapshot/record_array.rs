use std::cell::OnceCell;
use std::fmt;

use serde_json::Value;

use super::{Snapshot, SnapshotSource};
use crate::fetch::SnapshotOptions;
use crate::identifier::Lid;

/// Immutable view of a record array for `find_all` decisions.
///
/// Member snapshots are only built when [`snapshots`](Self::snapshots) is
/// first called.
pub struct SnapshotRecordArray<'a> {
    kind: String,
    lids: Vec<Lid>,
    meta: Option<Value>,
    options: SnapshotOptions,
    source: SnapshotSource<'a>,
    snapshots: OnceCell<Vec<Snapshot<'a>>>,
}

impl<'a> SnapshotRecordArray<'a> {
    pub(crate) fn new(
        kind: &str,
        lids: Vec<Lid>,
        meta: Option<Value>,
        options: SnapshotOptions,
        source: SnapshotSource<'a>,
    ) -> Self {
        SnapshotRecordArray {
            kind: kind.to_string(),
            lids,
            meta,
            options,
            source,
            snapshots: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.lids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lids.is_empty()
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn adapter_options(&self) -> Option<&Value> {
        self.options.adapter_options.as_ref()
    }

    pub fn include(&self) -> Option<&str> {
        self.options.include.as_deref()
    }

    pub fn snapshots(&self) -> &[Snapshot<'a>] {
        self.snapshots.get_or_init(|| {
            self.lids
                .iter()
                .filter_map(|lid| self.source.identifiers.resolve(lid))
                .map(|identifier| Snapshot::new(identifier, self.source, SnapshotOptions::default()))
                .collect()
        })
    }
}

impl fmt::Debug for SnapshotRecordArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRecordArray")
            .field("kind", &self.kind)
            .field("length", &self.lids.len())
            .finish()
    }
}

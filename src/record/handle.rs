use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::identifier::{Lid, RecordIdentifier, ResourceKey};

/// The user-facing record object.
///
/// Created lazily, at most once per cached record; every lookup of the same
/// record hands out a clone of the same handle. Reads and writes go through
/// the store, which owns the data.
#[derive(Clone)]
pub struct RecordHandle {
    inner: Rc<RefCell<RecordIdentifier>>,
}

impl RecordHandle {
    pub(crate) fn new(identifier: RecordIdentifier) -> Self {
        RecordHandle {
            inner: Rc::new(RefCell::new(identifier)),
        }
    }

    pub fn identifier(&self) -> RecordIdentifier {
        self.inner.borrow().clone()
    }

    pub fn lid(&self) -> Lid {
        self.inner.borrow().lid().clone()
    }

    pub fn kind(&self) -> String {
        self.inner.borrow().kind().to_string()
    }

    pub fn id(&self) -> Option<String> {
        self.inner.borrow().id().map(str::to_string)
    }

    /// Both handles are the same materialized record.
    pub fn ptr_eq(a: &RecordHandle, b: &RecordHandle) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn update_identifier(&self, identifier: &RecordIdentifier) {
        *self.inner.borrow_mut() = identifier.clone();
    }
}

impl PartialEq for RecordHandle {
    fn eq(&self, other: &Self) -> bool {
        RecordHandle::ptr_eq(self, other)
    }
}

impl Eq for RecordHandle {}

impl From<&RecordHandle> for ResourceKey {
    fn from(record: &RecordHandle) -> Self {
        record.inner.borrow().to_key()
    }
}

impl From<RecordHandle> for ResourceKey {
    fn from(record: RecordHandle) -> Self {
        ResourceKey::from(&record)
    }
}

impl fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordHandle")
            .field(&*self.inner.borrow())
            .finish()
    }
}

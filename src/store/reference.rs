use super::{Pushed, Store};
use crate::deferred::Deferred;
use crate::document::NormalizedDocument;
use crate::error::Result;
use crate::fetch::FindOptions;
use crate::identifier::{RecordIdentifier, ResourceKey};
use crate::record::RecordHandle;

/// A handle to a record that may not be loaded yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordReference {
    identifier: RecordIdentifier,
}

impl RecordReference {
    pub fn identifier(&self) -> &RecordIdentifier {
        &self.identifier
    }

    pub fn id(&self) -> Option<&str> {
        self.identifier.id()
    }

    pub fn remote_type(&self) -> &'static str {
        "identity"
    }

    /// The record if it is loaded.
    pub fn value(&self, store: &mut Store) -> Option<RecordHandle> {
        store.peek_record(&self.identifier)
    }

    /// Find the record, using the cache when it is loaded.
    pub fn load(&self, store: &mut Store) -> Deferred<RecordHandle> {
        store.find_record(&self.identifier, FindOptions::default())
    }

    /// Fetch the record even if it is loaded.
    pub fn reload(&self, store: &mut Store) -> Deferred<RecordHandle> {
        store.find_record(&self.identifier, FindOptions::new().reload())
    }

    /// Push a document for this record and return it.
    pub fn push(&self, store: &mut Store, document: NormalizedDocument) -> Result<Option<RecordHandle>> {
        store.push(document).map(Pushed::one)
    }
}

impl Store {
    /// A reference to `key`, registering its identifier if needed.
    pub fn get_reference(&mut self, key: impl Into<ResourceKey>) -> RecordReference {
        RecordReference {
            identifier: self.identifier_for(key),
        }
    }
}

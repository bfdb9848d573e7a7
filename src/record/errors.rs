use std::collections::BTreeMap;

use crate::error::{ValidationErrors, BASE_ERROR_KEY};

/// Validation messages attached to one record, keyed by attribute.
///
/// Messages without an attribute live under [`BASE_ERROR_KEY`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl RecordErrors {
    pub fn new() -> Self {
        RecordErrors::default()
    }

    pub fn replace(&mut self, errors: &ValidationErrors) {
        self.messages.clear();
        for error in errors.iter() {
            self.add(error.key(), error.message.clone());
        }
    }

    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(key.into())
            .or_default()
            .push(message.into());
    }

    /// Drop messages for `key`. Returns true if any were removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.messages.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.messages.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn base(&self) -> &[String] {
        self.get(BASE_ERROR_KEY)
    }

    pub fn has(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }
}

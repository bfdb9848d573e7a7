use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::Store;
use crate::error::{Result, StoreError};
use crate::fetch::SnapshotOptions;
use crate::identifier::ResourceKey;
use crate::notification::NotificationKind;
use crate::record::{RecordErrors, RecordState};
use crate::serializer::SerializeOptions;

impl Store {
    /// Current value of an attribute, local edits included.
    pub fn attr(&self, key: impl Into<ResourceKey>, name: &str) -> Option<Value> {
        let identifier = self.existing(key).ok()?;
        self.model(&identifier)?.attr(name).cloned()
    }

    pub fn attributes(&self, key: impl Into<ResourceKey>) -> Result<Map<String, Value>> {
        let identifier = self.existing(key)?;
        let model = self
            .model(&identifier)
            .ok_or(StoreError::Unloaded(identifier.clone()))?;
        Ok(model.data().attributes())
    }

    /// `name -> (original, current)` for each unsaved attribute.
    pub fn changed_attributes(&self, key: impl Into<ResourceKey>) -> Result<BTreeMap<String, (Value, Value)>> {
        let identifier = self.existing(key)?;
        let model = self
            .model(&identifier)
            .ok_or(StoreError::Unloaded(identifier.clone()))?;
        Ok(model.data().changed_attributes())
    }

    /// Write an attribute. Returns whether the visible value changed.
    pub fn set_attr(&mut self, key: impl Into<ResourceKey>, name: &str, value: Value) -> Result<bool> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        if !self.schema.model_for(identifier.kind()).has_attribute(name) {
            return Err(StoreError::UnknownAttribute {
                kind: identifier.kind().to_string(),
                key: name.to_string(),
            });
        }

        let model = self
            .model_mut(&identifier)
            .ok_or_else(|| StoreError::Unloaded(identifier.clone()))?;
        let before = model.state();
        let had_errors = model.errors().has(name);
        let changed = model.set_attr(name, value)?;
        let after = model.state();

        if changed {
            self.notify(&identifier, NotificationKind::Attributes, Some(name));
        }
        if had_errors {
            self.notify(&identifier, NotificationKind::Errors, Some(name));
        }
        if before != after {
            self.state_did_change(&identifier);
        }
        Ok(changed)
    }

    pub fn state(&self, key: impl Into<ResourceKey>) -> Option<RecordState> {
        let identifier = self.existing(key).ok()?;
        self.model(&identifier).map(|model| model.state())
    }

    /// Validation errors from the last rejected save.
    pub fn errors(&self, key: impl Into<ResourceKey>) -> Option<RecordErrors> {
        let identifier = self.existing(key).ok()?;
        self.model(&identifier).map(|model| model.errors().clone())
    }

    pub fn has_dirty_attributes(&self, key: impl Into<ResourceKey>) -> bool {
        self.existing(key)
            .ok()
            .and_then(|identifier| self.model(&identifier))
            .is_some_and(|model| model.has_dirty_attributes())
    }

    pub fn is_reloading(&self, key: impl Into<ResourceKey>) -> bool {
        self.existing(key)
            .ok()
            .and_then(|identifier| self.model(&identifier))
            .is_some_and(|model| model.is_reloading())
    }

    /// Serialize the record with its type's serializer.
    pub fn serialize(&self, key: impl Into<ResourceKey>, options: &SerializeOptions) -> Result<Value> {
        self.assert_alive();
        let identifier = self.existing(key)?;
        if self.model(&identifier).is_none() {
            return Err(StoreError::Unloaded(identifier));
        }
        let snapshot = self.snapshot(&identifier, SnapshotOptions::default());
        Ok(snapshot.serialize(options)?)
    }
}

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::trace;

use super::data::{DataChanges, RecordData, RelationshipData};
use super::errors::RecordErrors;
use super::handle::RecordHandle;
use super::state::{RecordEvent, RecordState};
use crate::error::{Result, StoreError};
use crate::identifier::RecordIdentifier;
use crate::record_array::ArrayId;

/// The canonical, non-UI handle for one cached record.
///
/// Owns the record's lifecycle state, its data and (once requested) its
/// user-facing [`RecordHandle`]. Lives in the identity map until unloaded.
#[derive(Debug)]
pub struct InternalModel {
    identifier: RecordIdentifier,
    state: RecordState,
    data: RecordData,
    record: Option<RecordHandle>,
    record_arrays: BTreeSet<ArrayId>,
    errors: RecordErrors,
    is_reloading: bool,
}

impl InternalModel {
    pub fn new(identifier: RecordIdentifier) -> Self {
        InternalModel {
            identifier,
            state: RecordState::Empty,
            data: RecordData::new(),
            record: None,
            record_arrays: BTreeSet::new(),
            errors: RecordErrors::new(),
            is_reloading: false,
        }
    }

    pub fn identifier(&self) -> &RecordIdentifier {
        &self.identifier
    }

    pub(crate) fn set_identifier(&mut self, identifier: RecordIdentifier) {
        if let Some(record) = &self.record {
            record.update_identifier(&identifier);
        }
        self.identifier = identifier;
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Drive the lifecycle. Invalid events leave the state untouched.
    pub fn send(&mut self, event: RecordEvent) -> Result<RecordState> {
        match self.state.transition(event) {
            Some(next) => {
                trace!(
                    identifier = %self.identifier,
                    event = event.name(),
                    from = self.state.name(),
                    to = next.name(),
                    "transition"
                );
                self.state = next;
                Ok(next)
            }
            None => Err(StoreError::InvalidTransition {
                identifier: self.identifier.clone(),
                state: self.state,
                event: event.name(),
            }),
        }
    }

    pub fn data(&self) -> &RecordData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut RecordData {
        &mut self.data
    }

    /// Materialize the user-facing record on first use.
    pub fn record(&mut self) -> RecordHandle {
        self.record
            .get_or_insert_with(|| RecordHandle::new(self.identifier.clone()))
            .clone()
    }

    pub fn peek_record(&self) -> Option<&RecordHandle> {
        self.record.as_ref()
    }

    pub fn has_record(&self) -> bool {
        self.record.is_some()
    }

    /// Take over a handle materialized for a merged-away duplicate.
    pub(crate) fn adopt_record(&mut self, record: RecordHandle) {
        record.update_identifier(&self.identifier);
        self.record = Some(record);
    }

    pub(crate) fn take_record(&mut self) -> Option<RecordHandle> {
        self.record.take()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn is_new(&self) -> bool {
        self.state.is_new()
    }

    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }

    /// Visible to live record arrays.
    pub fn is_visible(&self) -> bool {
        self.state.is_loaded() && !self.state.is_hidden()
    }

    pub fn has_dirty_attributes(&self) -> bool {
        self.state.is_dirty()
    }

    pub fn is_reloading(&self) -> bool {
        self.is_reloading
    }

    pub(crate) fn set_reloading(&mut self, reloading: bool) {
        self.is_reloading = reloading;
    }

    pub fn errors(&self) -> &RecordErrors {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut RecordErrors {
        &mut self.errors
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.data.attr(key)
    }

    /// Write an attribute locally.
    ///
    /// Fails while the record is being saved: a write racing the save would be
    /// lost when the server response lands.
    pub fn set_attr(&mut self, key: &str, value: Value) -> Result<bool> {
        self.ensure_writable(key)?;
        if self.state.transition(RecordEvent::BecomeDirty).is_none() {
            return Err(StoreError::InvalidTransition {
                identifier: self.identifier.clone(),
                state: self.state,
                event: RecordEvent::BecomeDirty.name(),
            });
        }

        if !self.data.set_attr(key, value) {
            return Ok(false);
        }

        if let RecordState::Invalid(_) = self.state {
            self.errors.remove(key);
            if self.errors.is_empty() {
                self.send(RecordEvent::BecameValid)?;
            }
        }
        self.after_local_change()?;
        Ok(true)
    }

    pub fn set_relationship(&mut self, key: &str, data: RelationshipData) -> Result<bool> {
        self.ensure_writable(key)?;
        if self.state.transition(RecordEvent::BecomeDirty).is_none() {
            return Err(StoreError::InvalidTransition {
                identifier: self.identifier.clone(),
                state: self.state,
                event: RecordEvent::BecomeDirty.name(),
            });
        }
        Ok(self.data.set_relationship(key, data))
    }

    fn ensure_writable(&self, key: &str) -> Result<()> {
        if self.state.is_in_flight() {
            return Err(StoreError::InFlightMutation {
                identifier: self.identifier.clone(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn after_local_change(&mut self) -> Result<()> {
        match self.state {
            RecordState::UpdatedUncommitted if !self.data.has_changed_attributes() => {
                self.send(RecordEvent::RolledBack)?;
            }
            RecordState::Saved if self.data.has_changed_attributes() => {
                self.send(RecordEvent::BecomeDirty)?;
            }
            RecordState::Saved | RecordState::UpdatedUncommitted | RecordState::Invalid(_) => {}
            _ => {
                self.send(RecordEvent::BecomeDirty)?;
            }
        }
        Ok(())
    }

    /// Discard local edits and errors. New records become hidden.
    pub fn rollback_attributes(&mut self) -> Result<DataChanges> {
        if self.state.is_in_flight() {
            return Err(StoreError::InvalidTransition {
                identifier: self.identifier.clone(),
                state: self.state,
                event: RecordEvent::RolledBack.name(),
            });
        }
        let attributes = self.data.rollback_attributes();
        self.errors.clear();
        if self.state.is_dirty() {
            self.send(RecordEvent::RolledBack)?;
        }
        Ok(DataChanges {
            attributes,
            relationships: Vec::new(),
        })
    }

    pub fn record_arrays(&self) -> &BTreeSet<ArrayId> {
        &self.record_arrays
    }

    pub(crate) fn add_to_record_array(&mut self, array: ArrayId) {
        self.record_arrays.insert(array);
    }

    pub(crate) fn remove_from_record_array(&mut self, array: ArrayId) {
        self.record_arrays.remove(&array);
    }

    pub(crate) fn take_record_arrays(&mut self) -> BTreeSet<ArrayId> {
        std::mem::take(&mut self.record_arrays)
    }
}

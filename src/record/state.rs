//! Record lifecycle: a flat state enum plus a `(state, event) -> state` table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of unsaved change a dirty record carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirtyType {
    Created,
    Updated,
    Deleted,
}

impl DirtyType {
    fn uncommitted(self) -> RecordState {
        match self {
            DirtyType::Created => RecordState::CreatedUncommitted,
            DirtyType::Updated => RecordState::UpdatedUncommitted,
            DirtyType::Deleted => RecordState::DeletedUncommitted,
        }
    }

    fn in_flight(self) -> RecordState {
        match self {
            DirtyType::Created => RecordState::CreatedInFlight,
            DirtyType::Updated => RecordState::UpdatedInFlight,
            DirtyType::Deleted => RecordState::DeletedInFlight,
        }
    }

    fn rolled_back(self) -> RecordState {
        match self {
            DirtyType::Created => RecordState::DeletedSaved,
            DirtyType::Updated | DirtyType::Deleted => RecordState::Saved,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordState {
    Empty,
    Loading,
    Saved,
    UpdatedUncommitted,
    UpdatedInFlight,
    CreatedUncommitted,
    CreatedInFlight,
    DeletedUncommitted,
    DeletedInFlight,
    DeletedSaved,
    /// Rejected by server-side validation; the pending change is kept.
    Invalid(DirtyType),
    /// Adapter failure. `None` means the initial load failed.
    Error(Option<DirtyType>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordEvent {
    LoadingData,
    LoadedData,
    PushedData,
    DidCreateRecord,
    BecomeDirty,
    BecameValid,
    DeleteRecord,
    WillCommit,
    DidCommit,
    BecameInvalid,
    BecameError,
    UnloadRecord,
    RolledBack,
    NotFound,
}

impl RecordEvent {
    pub fn name(self) -> &'static str {
        match self {
            RecordEvent::LoadingData => "loadingData",
            RecordEvent::LoadedData => "loadedData",
            RecordEvent::PushedData => "pushedData",
            RecordEvent::DidCreateRecord => "didCreateRecord",
            RecordEvent::BecomeDirty => "becomeDirty",
            RecordEvent::BecameValid => "becameValid",
            RecordEvent::DeleteRecord => "deleteRecord",
            RecordEvent::WillCommit => "willCommit",
            RecordEvent::DidCommit => "didCommit",
            RecordEvent::BecameInvalid => "becameInvalid",
            RecordEvent::BecameError => "becameError",
            RecordEvent::UnloadRecord => "unloadRecord",
            RecordEvent::RolledBack => "rolledBack",
            RecordEvent::NotFound => "notFound",
        }
    }
}

impl RecordState {
    pub fn name(&self) -> &'static str {
        match self {
            RecordState::Empty => "empty",
            RecordState::Loading => "loading",
            RecordState::Saved => "loaded.saved",
            RecordState::UpdatedUncommitted => "loaded.updated.uncommitted",
            RecordState::UpdatedInFlight => "loaded.updated.inFlight",
            RecordState::CreatedUncommitted => "loaded.created.uncommitted",
            RecordState::CreatedInFlight => "loaded.created.inFlight",
            RecordState::DeletedUncommitted => "deleted.uncommitted",
            RecordState::DeletedInFlight => "deleted.inFlight",
            RecordState::DeletedSaved => "deleted.saved",
            RecordState::Invalid(_) => "invalid",
            RecordState::Error(_) => "error",
        }
    }

    /// Next state for `event`, or `None` when the event is not valid here.
    pub fn transition(self, event: RecordEvent) -> Option<RecordState> {
        use RecordEvent::*;
        use RecordState::*;

        if event == UnloadRecord {
            return if self.is_in_flight() { None } else { Some(Empty) };
        }

        let next = match (self, event) {
            (Empty, LoadingData) => Loading,
            (Empty, LoadedData | PushedData) => Saved,
            (Empty, DidCreateRecord) => CreatedUncommitted,

            (Loading, LoadingData) => Loading,
            (Loading, LoadedData | PushedData) => Saved,
            (Loading, NotFound) => Empty,
            (Loading, BecameError) => Error(None),

            (Saved, LoadingData | LoadedData | PushedData | RolledBack) => Saved,
            (Saved, BecomeDirty) => UpdatedUncommitted,
            (Saved, DeleteRecord) => DeletedUncommitted,
            (Saved, WillCommit) => UpdatedInFlight,

            (UpdatedUncommitted, LoadingData | LoadedData | PushedData | BecomeDirty) => {
                UpdatedUncommitted
            }
            (UpdatedUncommitted, RolledBack) => Saved,
            (UpdatedUncommitted, DeleteRecord) => DeletedUncommitted,
            (UpdatedUncommitted, WillCommit) => UpdatedInFlight,

            (UpdatedInFlight, LoadingData | LoadedData | PushedData) => UpdatedInFlight,
            (UpdatedInFlight, DidCommit) => Saved,
            (UpdatedInFlight, BecameInvalid) => Invalid(DirtyType::Updated),
            (UpdatedInFlight, BecameError) => Error(Some(DirtyType::Updated)),

            (CreatedUncommitted, BecomeDirty) => CreatedUncommitted,
            (CreatedUncommitted, PushedData) => UpdatedUncommitted,
            (CreatedUncommitted, DeleteRecord | RolledBack) => DeletedSaved,
            (CreatedUncommitted, WillCommit) => CreatedInFlight,

            (CreatedInFlight, PushedData) => CreatedInFlight,
            (CreatedInFlight, DidCommit) => Saved,
            (CreatedInFlight, BecameInvalid) => Invalid(DirtyType::Created),
            (CreatedInFlight, BecameError) => Error(Some(DirtyType::Created)),

            (
                DeletedUncommitted,
                LoadingData | LoadedData | PushedData | BecomeDirty | DeleteRecord,
            ) => DeletedUncommitted,
            (DeletedUncommitted, RolledBack) => Saved,
            (DeletedUncommitted, WillCommit) => DeletedInFlight,

            (DeletedInFlight, LoadedData | PushedData) => DeletedInFlight,
            (DeletedInFlight, DidCommit) => DeletedSaved,
            (DeletedInFlight, BecameInvalid) => Invalid(DirtyType::Deleted),
            (DeletedInFlight, BecameError) => Error(Some(DirtyType::Deleted)),

            (DeletedSaved, LoadedData | PushedData | DeleteRecord) => DeletedSaved,

            (Invalid(dirty), LoadedData | PushedData | BecomeDirty) => Invalid(dirty),
            (Invalid(dirty), BecameValid) => dirty.uncommitted(),
            (Invalid(dirty), WillCommit) => dirty.in_flight(),
            (Invalid(dirty), RolledBack) => dirty.rolled_back(),
            (Invalid(DirtyType::Created), DeleteRecord) => DeletedSaved,
            (Invalid(DirtyType::Updated), DeleteRecord) => DeletedUncommitted,
            (Invalid(DirtyType::Deleted), DeleteRecord) => Invalid(DirtyType::Deleted),

            (Error(None), LoadingData) => Loading,
            (Error(None), LoadedData | PushedData) => Saved,
            (Error(Some(dirty)), LoadedData | PushedData) => Error(Some(dirty)),
            (Error(Some(dirty)), BecomeDirty) => dirty.uncommitted(),
            (Error(Some(dirty)), WillCommit) => dirty.in_flight(),
            (Error(Some(dirty)), RolledBack) => dirty.rolled_back(),
            (Error(Some(DirtyType::Created)), DeleteRecord) => DeletedSaved,
            (Error(Some(DirtyType::Updated)), DeleteRecord) => DeletedUncommitted,
            (Error(Some(DirtyType::Deleted)), DeleteRecord) => Error(Some(DirtyType::Deleted)),

            _ => return None,
        };
        Some(next)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RecordState::Empty)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RecordState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(
            self,
            RecordState::Empty | RecordState::Loading | RecordState::Error(None)
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RecordState::UpdatedInFlight | RecordState::CreatedInFlight | RecordState::DeletedInFlight
        )
    }

    pub fn is_saving(&self) -> bool {
        self.is_in_flight()
    }

    pub fn dirty_type(&self) -> Option<DirtyType> {
        match self {
            RecordState::UpdatedUncommitted | RecordState::UpdatedInFlight => {
                Some(DirtyType::Updated)
            }
            RecordState::CreatedUncommitted | RecordState::CreatedInFlight => {
                Some(DirtyType::Created)
            }
            RecordState::DeletedUncommitted | RecordState::DeletedInFlight => {
                Some(DirtyType::Deleted)
            }
            RecordState::Invalid(dirty) => Some(*dirty),
            RecordState::Error(dirty) => *dirty,
            _ => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_type().is_some()
    }

    pub fn is_new(&self) -> bool {
        self.dirty_type() == Some(DirtyType::Created)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, RecordState::DeletedSaved) || self.dirty_type() == Some(DirtyType::Deleted)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, RecordState::Invalid(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecordState::Error(_))
    }

    /// Deleted and committed, or created then discarded.
    pub fn is_hidden(&self) -> bool {
        matches!(self, RecordState::DeletedSaved)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! The transport seam: how the store asks a backend for data.
//!
//! Adapters are synchronous from the store's point of view. They are called
//! while the store drains its task queue and receive immutable snapshots;
//! they return the raw payload, which the type's serializer normalizes.

use std::fmt;

use serde_json::Value;

use crate::error::AdapterError;
use crate::fetch::RequestOptions;
use crate::record_array::RecordArray;
use crate::snapshot::{Snapshot, SnapshotRecordArray};

pub type AdapterResult = Result<Value, AdapterError>;

/// Which adapter operation produced a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestType {
    FindRecord,
    FindMany,
    FindAll,
    Query,
    QueryRecord,
    FindHasMany,
    FindBelongsTo,
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
}

impl RequestType {
    pub fn name(&self) -> &'static str {
        match self {
            RequestType::FindRecord => "findRecord",
            RequestType::FindMany => "findMany",
            RequestType::FindAll => "findAll",
            RequestType::Query => "query",
            RequestType::QueryRecord => "queryRecord",
            RequestType::FindHasMany => "findHasMany",
            RequestType::FindBelongsTo => "findBelongsTo",
            RequestType::CreateRecord => "createRecord",
            RequestType::UpdateRecord => "updateRecord",
            RequestType::DeleteRecord => "deleteRecord",
        }
    }

    /// Requests whose primary data must be a single resource or null.
    pub fn expects_single(&self) -> bool {
        !matches!(
            self,
            RequestType::FindMany | RequestType::FindAll | RequestType::Query | RequestType::FindHasMany
        )
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Adapter {
    fn find_record(&self, kind: &str, id: &str, snapshot: &Snapshot<'_>) -> AdapterResult;

    fn find_all(&self, kind: &str, since_token: Option<&str>, snapshots: &SnapshotRecordArray<'_>) -> AdapterResult;

    fn query(&self, kind: &str, query: &Value, array: &RecordArray, options: &RequestOptions) -> AdapterResult;

    fn query_record(&self, kind: &str, query: &Value, options: &RequestOptions) -> AdapterResult;

    fn create_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult;

    fn update_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult;

    fn delete_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult;

    /// Batch fetch. Only called when [`coalesce_find_requests`] and
    /// [`supports_find_many`] both return true.
    ///
    /// [`coalesce_find_requests`]: Adapter::coalesce_find_requests
    /// [`supports_find_many`]: Adapter::supports_find_many
    fn find_many(&self, _kind: &str, _ids: &[String], _snapshots: &[Snapshot<'_>]) -> AdapterResult {
        Err(AdapterError::Unsupported("findMany"))
    }

    fn find_has_many(&self, _snapshot: &Snapshot<'_>, _url: &str, _relationship: &str) -> AdapterResult {
        Err(AdapterError::Unsupported("findHasMany"))
    }

    fn find_belongs_to(&self, _snapshot: &Snapshot<'_>, _url: &str, _relationship: &str) -> AdapterResult {
        Err(AdapterError::Unsupported("findBelongsTo"))
    }

    fn coalesce_find_requests(&self) -> bool {
        false
    }

    fn supports_find_many(&self) -> bool {
        false
    }

    /// Split one type's pending fetches into batches. Each group of two or
    /// more becomes one [`find_many`](Adapter::find_many) call.
    fn group_records_for_find_many<'a>(&self, snapshots: Vec<Snapshot<'a>>) -> Vec<Vec<Snapshot<'a>>> {
        vec![snapshots]
    }

    /// Whether a cached record must be refetched before `find_record` resolves.
    fn should_reload_record(&self, _snapshot: &Snapshot<'_>) -> bool {
        false
    }

    /// Whether a cached record is refreshed in the background.
    fn should_background_reload_record(&self, _snapshot: &Snapshot<'_>) -> bool {
        true
    }

    fn should_reload_all(&self, snapshots: &SnapshotRecordArray<'_>) -> bool {
        snapshots.is_empty()
    }

    fn should_background_reload_all(&self, _snapshots: &SnapshotRecordArray<'_>) -> bool {
        true
    }
}

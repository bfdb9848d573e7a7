use serde_json::Value;

use super::options::{FindAllOptions, RequestOptions};
use crate::deferred::Deferred;
use crate::error::StoreError;
use crate::identifier::RecordIdentifier;
use crate::record::RecordHandle;
use crate::record_array::ArrayId;

/// A queued adapter request that is not coalesced.
#[derive(Debug)]
pub enum StoreRequest {
    FindAll {
        kind: String,
        array: ArrayId,
        options: FindAllOptions,
        deferred: Deferred<ArrayId>,
    },
    Query {
        kind: String,
        array: ArrayId,
        query: Value,
        options: RequestOptions,
        deferred: Deferred<ArrayId>,
    },
    QueryRecord {
        kind: String,
        query: Value,
        options: RequestOptions,
        deferred: Deferred<Option<RecordHandle>>,
    },
    FindHasMany {
        owner: RecordIdentifier,
        key: String,
        url: String,
        deferred: Deferred<Vec<RecordHandle>>,
    },
    FindBelongsTo {
        owner: RecordIdentifier,
        key: String,
        url: String,
        deferred: Deferred<Option<RecordHandle>>,
    },
}

impl StoreRequest {
    pub fn name(&self) -> &'static str {
        match self {
            StoreRequest::FindAll { .. } => "findAll",
            StoreRequest::Query { .. } => "query",
            StoreRequest::QueryRecord { .. } => "queryRecord",
            StoreRequest::FindHasMany { .. } => "findHasMany",
            StoreRequest::FindBelongsTo { .. } => "findBelongsTo",
        }
    }

    /// Settle the request's deferred with `error` without running it.
    pub fn reject(self, error: StoreError) {
        match self {
            StoreRequest::FindAll { deferred, .. } | StoreRequest::Query { deferred, .. } => {
                deferred.reject(error);
            }
            StoreRequest::QueryRecord { deferred, .. }
            | StoreRequest::FindBelongsTo { deferred, .. } => {
                deferred.reject(error);
            }
            StoreRequest::FindHasMany { deferred, .. } => {
                deferred.reject(error);
            }
        }
    }
}

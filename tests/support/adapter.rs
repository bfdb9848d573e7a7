use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use record_cache::{
    Adapter, AdapterError, AdapterResult, RecordArray, RequestOptions, Snapshot,
    SnapshotRecordArray,
};
use serde_json::{json, Value};

/// One adapter call, as the tests assert on it.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    FindRecord { kind: String, id: String },
    FindMany { kind: String, ids: Vec<String> },
    FindAll { kind: String },
    Query { kind: String, query: Value },
    QueryRecord { kind: String, query: Value },
    FindHasMany { url: String, relationship: String },
    FindBelongsTo { url: String, relationship: String },
    CreateRecord { kind: String, attributes: Value },
    UpdateRecord { kind: String, id: String },
    DeleteRecord { kind: String, id: String },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    resources: BTreeMap<(String, String), Value>,
    links: HashMap<String, Value>,
    queries: HashMap<String, Value>,
    find_failures: HashMap<(String, String), AdapterError>,
    save_failures: VecDeque<AdapterError>,
    omitted: HashSet<String>,
    next_id: u64,
    coalesce: bool,
    background_reload: bool,
    group_size: Option<usize>,
}

/// Serves JSON:API documents from an in-memory table and logs every call.
///
/// Clones share state, so a test keeps one clone to script responses and
/// inspect calls while the store owns another. Background reloads are off
/// unless [`with_background_reload`](Self::with_background_reload) is used.
#[derive(Clone, Default)]
pub struct RecordingAdapter {
    state: Rc<RefCell<State>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        RecordingAdapter::default()
    }

    pub fn coalescing(self) -> Self {
        self.state.borrow_mut().coalesce = true;
        self
    }

    pub fn with_background_reload(self) -> Self {
        self.state.borrow_mut().background_reload = true;
        self
    }

    /// Coalesced fetches are split into batches of at most `size`.
    pub fn with_group_size(self, size: usize) -> Self {
        self.state.borrow_mut().group_size = Some(size);
        self
    }

    /// Serve `{ type, id, attributes }` for `kind`/`id`.
    pub fn with_resource(self, kind: &str, id: &str, attributes: Value) -> Self {
        self.set_resource(json!({ "type": kind, "id": id, "attributes": attributes }));
        self
    }

    pub fn set_resource(&self, resource: Value) {
        let kind = resource["type"].as_str().unwrap_or_default().to_string();
        let id = resource["id"].as_str().unwrap_or_default().to_string();
        self.state.borrow_mut().resources.insert((kind, id), resource);
    }

    pub fn with_link(self, url: &str, document: Value) -> Self {
        self.state
            .borrow_mut()
            .links
            .insert(url.to_string(), document);
        self
    }

    /// The document returned by `query` and `query_record` for `kind`.
    pub fn with_query_result(self, kind: &str, document: Value) -> Self {
        self.state
            .borrow_mut()
            .queries
            .insert(kind.to_string(), document);
        self
    }

    pub fn fail_find(&self, kind: &str, id: &str, error: AdapterError) {
        self.state
            .borrow_mut()
            .find_failures
            .insert((kind.to_string(), id.to_string()), error);
    }

    /// The next save fails with `error`.
    pub fn fail_next_save(&self, error: AdapterError) {
        self.state.borrow_mut().save_failures.push_back(error);
    }

    /// Leave `id` out of `find_many` responses.
    pub fn omit_from_batch(&self, id: &str) {
        self.state.borrow_mut().omitted.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn resource(&self, kind: &str, id: &str) -> Option<Value> {
        self.state
            .borrow()
            .resources
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    fn take_save_failure(&self) -> Option<AdapterError> {
        self.state.borrow_mut().save_failures.pop_front()
    }
}

impl Adapter for RecordingAdapter {
    fn find_record(&self, kind: &str, id: &str, _snapshot: &Snapshot<'_>) -> AdapterResult {
        self.record(Call::FindRecord {
            kind: kind.to_string(),
            id: id.to_string(),
        });
        let failure = self
            .state
            .borrow()
            .find_failures
            .get(&(kind.to_string(), id.to_string()))
            .cloned();
        if let Some(error) = failure {
            return Err(error);
        }
        match self.resource(kind, id) {
            Some(resource) => Ok(json!({ "data": resource })),
            None => Err(AdapterError::NotFound),
        }
    }

    fn find_many(&self, kind: &str, ids: &[String], _snapshots: &[Snapshot<'_>]) -> AdapterResult {
        self.record(Call::FindMany {
            kind: kind.to_string(),
            ids: ids.to_vec(),
        });
        let omitted = self.state.borrow().omitted.clone();
        let data: Vec<Value> = ids
            .iter()
            .filter(|id| !omitted.contains(*id))
            .filter_map(|id| self.resource(kind, id))
            .collect();
        Ok(json!({ "data": data }))
    }

    fn find_all(&self, kind: &str, _since_token: Option<&str>, _snapshots: &SnapshotRecordArray<'_>) -> AdapterResult {
        self.record(Call::FindAll {
            kind: kind.to_string(),
        });
        let data: Vec<Value> = self
            .state
            .borrow()
            .resources
            .iter()
            .filter(|((resource_kind, _), _)| resource_kind == kind)
            .map(|(_, resource)| resource.clone())
            .collect();
        Ok(json!({ "data": data }))
    }

    fn query(&self, kind: &str, query: &Value, _array: &RecordArray, _options: &RequestOptions) -> AdapterResult {
        self.record(Call::Query {
            kind: kind.to_string(),
            query: query.clone(),
        });
        let document = self.state.borrow().queries.get(kind).cloned();
        Ok(document.unwrap_or_else(|| json!({ "data": [] })))
    }

    fn query_record(&self, kind: &str, query: &Value, _options: &RequestOptions) -> AdapterResult {
        self.record(Call::QueryRecord {
            kind: kind.to_string(),
            query: query.clone(),
        });
        let document = self.state.borrow().queries.get(kind).cloned();
        Ok(document.unwrap_or_else(|| json!({ "data": null })))
    }

    fn find_has_many(&self, _snapshot: &Snapshot<'_>, url: &str, relationship: &str) -> AdapterResult {
        self.record(Call::FindHasMany {
            url: url.to_string(),
            relationship: relationship.to_string(),
        });
        let document = self.state.borrow().links.get(url).cloned();
        document.ok_or(AdapterError::NotFound)
    }

    fn find_belongs_to(&self, _snapshot: &Snapshot<'_>, url: &str, relationship: &str) -> AdapterResult {
        self.record(Call::FindBelongsTo {
            url: url.to_string(),
            relationship: relationship.to_string(),
        });
        let document = self.state.borrow().links.get(url).cloned();
        document.ok_or(AdapterError::NotFound)
    }

    fn create_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult {
        let attributes = Value::Object(snapshot.attributes().clone());
        self.record(Call::CreateRecord {
            kind: kind.to_string(),
            attributes: attributes.clone(),
        });
        if let Some(error) = self.take_save_failure() {
            return Err(error);
        }

        let id = match snapshot.id() {
            Some(id) => id.to_string(),
            None => {
                let mut state = self.state.borrow_mut();
                state.next_id += 1;
                format!("server-{}", state.next_id)
            }
        };
        let resource = json!({ "type": kind, "id": id, "attributes": attributes });
        self.set_resource(resource.clone());
        Ok(json!({ "data": resource }))
    }

    fn update_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult {
        let id = snapshot.id().unwrap_or_default().to_string();
        self.record(Call::UpdateRecord {
            kind: kind.to_string(),
            id,
        });
        match self.take_save_failure() {
            Some(error) => Err(error),
            None => Ok(Value::Null),
        }
    }

    fn delete_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult {
        let id = snapshot.id().unwrap_or_default().to_string();
        self.record(Call::DeleteRecord {
            kind: kind.to_string(),
            id,
        });
        match self.take_save_failure() {
            Some(error) => Err(error),
            None => Ok(Value::Null),
        }
    }

    fn coalesce_find_requests(&self) -> bool {
        self.state.borrow().coalesce
    }

    fn supports_find_many(&self) -> bool {
        true
    }

    fn group_records_for_find_many<'a>(&self, snapshots: Vec<Snapshot<'a>>) -> Vec<Vec<Snapshot<'a>>> {
        let Some(size) = self.state.borrow().group_size else {
            return vec![snapshots];
        };
        let mut groups: Vec<Vec<Snapshot<'a>>> = Vec::new();
        for snapshot in snapshots {
            match groups.last_mut() {
                Some(group) if group.len() < size => group.push(snapshot),
                _ => groups.push(vec![snapshot]),
            }
        }
        groups
    }

    fn should_background_reload_record(&self, _snapshot: &Snapshot<'_>) -> bool {
        self.state.borrow().background_reload
    }

    fn should_background_reload_all(&self, _snapshots: &SnapshotRecordArray<'_>) -> bool {
        self.state.borrow().background_reload
    }
}

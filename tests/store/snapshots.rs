use std::cell::RefCell;
use std::rc::Rc;

use record_cache::{
    Adapter, AdapterError, AdapterResult, NormalizedDocument, RecordArray, RequestOptions,
    RequestType, ResourceObject, SerializeOptions, Serializer, SerializerError, Snapshot,
    SnapshotRecordArray,
};
use serde_json::{json, Value};

use crate::support::{self, RecordingAdapter};

#[derive(Clone, Debug, PartialEq)]
struct Seen {
    body: Value,
    author: Option<Option<String>>,
    comments: Option<Vec<String>>,
}

/// Keeps what each create request saw and answers with a fixed id.
#[derive(Clone, Default)]
struct CapturingAdapter {
    seen: Rc<RefCell<Vec<Seen>>>,
}

impl Adapter for CapturingAdapter {
    fn find_record(&self, _kind: &str, _id: &str, _snapshot: &Snapshot<'_>) -> AdapterResult {
        Err(AdapterError::NotFound)
    }

    fn find_all(&self, _kind: &str, _since: Option<&str>, _snapshots: &SnapshotRecordArray<'_>) -> AdapterResult {
        Ok(json!({ "data": [] }))
    }

    fn query(&self, _kind: &str, _query: &Value, _array: &RecordArray, _options: &RequestOptions) -> AdapterResult {
        Ok(json!({ "data": [] }))
    }

    fn query_record(&self, _kind: &str, _query: &Value, _options: &RequestOptions) -> AdapterResult {
        Ok(Value::Null)
    }

    fn create_record(&self, kind: &str, snapshot: &Snapshot<'_>) -> AdapterResult {
        let body = snapshot
            .serialize(&SerializeOptions::default())
            .map_err(|err| AdapterError::Other(err.to_string()))?;
        let (author, comments) = if kind == "post" {
            (snapshot.belongs_to_id("author"), snapshot.has_many_ids("comments"))
        } else {
            (None, None)
        };
        self.seen.borrow_mut().push(Seen { body, author, comments });
        Ok(json!({ "data": { "type": kind, "id": "10" } }))
    }

    fn update_record(&self, _kind: &str, _snapshot: &Snapshot<'_>) -> AdapterResult {
        Ok(Value::Null)
    }

    fn delete_record(&self, _kind: &str, _snapshot: &Snapshot<'_>) -> AdapterResult {
        Ok(Value::Null)
    }
}

#[test]
fn serialize_writes_a_json_api_document() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    store
        .push_payload(
            "post",
            json!({
                "data": {
                    "type": "post",
                    "id": "1",
                    "attributes": { "title": "Hello" },
                    "relationships": {
                        "author": { "data": { "type": "person", "id": "9" } },
                        "comments": { "data": [{ "type": "comment", "id": "3" }] }
                    }
                }
            }),
        )
        .unwrap();

    let document = store
        .serialize(("post", "1"), &SerializeOptions::include_id())
        .unwrap();

    assert_eq!(
        document,
        json!({
            "data": {
                "type": "post",
                "id": "1",
                "attributes": { "title": "Hello", "body": null },
                "relationships": {
                    "author": { "data": { "type": "person", "id": "9" } },
                    "comments": { "data": [{ "type": "comment", "id": "3" }] }
                }
            }
        })
    );
}

#[test]
fn unknown_linkage_is_left_out() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    store
        .push(NormalizedDocument::single(ResourceObject::new("post", "1")))
        .unwrap();

    let document = store.serialize(("post", "1"), &SerializeOptions::default()).unwrap();
    assert_eq!(
        document,
        json!({ "data": { "type": "post", "attributes": { "title": null, "body": null } } })
    );
}

#[test]
fn adapters_see_related_ids_without_deleted_records() {
    let adapter = CapturingAdapter::default();
    let seen = adapter.seen.clone();
    let mut store = support::blog().with_adapter(adapter).build();
    store
        .push_payload(
            "comment",
            json!({ "data": [{ "type": "comment", "id": "1" }, { "type": "comment", "id": "2" }] }),
        )
        .unwrap();
    store
        .push_payload("person", json!({ "data": { "type": "person", "id": "9" } }))
        .unwrap();
    store.delete_record(("comment", "2")).unwrap();

    let post = store
        .create_record(
            "post",
            json!({ "title": "Draft", "author": "9", "comments": ["1", "2"] }),
        )
        .unwrap();
    let saved = store.save_record(&post, RequestOptions::default()).unwrap();
    store.settle(&saved).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].author, Some(Some("9".to_string())));
    assert_eq!(seen[0].comments, Some(vec!["1".to_string()]));
    assert_eq!(
        seen[0].body["data"]["relationships"]["comments"],
        json!({ "data": [{ "type": "comment", "id": "1" }] })
    );
    assert_eq!(post.id().as_deref(), Some("10"));
}

/// Reads `{ "people": [{ "id": .., "name": .. }] }` and writes flat objects.
struct FlatSerializer;

impl Serializer for FlatSerializer {
    fn normalize_response(
        &self,
        kind: &str,
        payload: Value,
        _id: Option<&str>,
        request_type: RequestType,
    ) -> Result<NormalizedDocument, SerializerError> {
        let people = payload["people"].as_array().cloned().unwrap_or_default();
        let resources: Vec<_> = people
            .iter()
            .map(|person| {
                ResourceObject::new(kind, person["id"].as_str().unwrap_or_default())
                    .with_attribute("name", person["name"].clone())
            })
            .collect();
        if request_type.expects_single() {
            Ok(match resources.into_iter().next() {
                Some(resource) => NormalizedDocument::single(resource),
                None => NormalizedDocument::empty(),
            })
        } else {
            Ok(NormalizedDocument::many(resources))
        }
    }

    fn serialize(&self, snapshot: &Snapshot<'_>, _options: &SerializeOptions) -> Result<Value, SerializerError> {
        Ok(json!({ "name": snapshot.attr("name") }))
    }
}

#[test]
fn serializers_can_be_set_per_type() {
    let adapter = RecordingAdapter::new().with_query_result(
        "person",
        json!({ "people": [{ "id": "1", "name": "Ada" }, { "id": "2", "name": "Grace" }] }),
    );
    let mut store = support::blog()
        .with_adapter(adapter.clone())
        .with_serializer_for("person", FlatSerializer)
        .build();

    let queried = store.query("person", json!({}), RequestOptions::default());
    let people = store.settle(&queried).unwrap();
    assert_eq!(store.record_array(people).unwrap().len(), 2);
    assert_eq!(store.attr(("person", "2"), "name"), Some(json!("Grace")));

    let flat = store.serialize(("person", "1"), &SerializeOptions::default()).unwrap();
    assert_eq!(flat, json!({ "name": "Ada" }));
}

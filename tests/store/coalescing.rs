use record_cache::{AdapterError, DiagnosticKind, FindOptions, NormalizedDocument, ResourceObject, StoreError};
use serde_json::json;

use crate::support::{self, Call, RecordingAdapter};

fn find_record(kind: &str, id: &str) -> Call {
    Call::FindRecord {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

fn posts(adapter: RecordingAdapter) -> RecordingAdapter {
    adapter
        .with_resource("post", "1", json!({ "title": "One" }))
        .with_resource("post", "2", json!({ "title": "Two" }))
        .with_resource("post", "3", json!({ "title": "Three" }))
}

#[test]
fn concurrent_finds_for_one_record_share_a_request() {
    let adapter = posts(RecordingAdapter::new());
    let mut store = support::store(&adapter);

    let first = store.find_record(("post", "1"), FindOptions::default());
    let second = store.find_record(("post", "1"), FindOptions::default());
    let third = store.find_record(("post", "1"), FindOptions::default());
    assert!(!first.is_settled());

    let a = store.settle(&first).unwrap();
    let b = store.settle(&second).unwrap();
    let c = store.settle(&third).unwrap();

    assert_eq!(adapter.calls(), vec![find_record("post", "1")]);
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(store.attr(&a, "title"), Some(json!("One")));
}

#[test]
fn coalescing_adapter_gets_one_batch() {
    let adapter = posts(RecordingAdapter::new().coalescing());
    let mut store = support::store(&adapter);

    let pending: Vec<_> = ["1", "2", "3"]
        .iter()
        .map(|id| store.find_record(("post", *id), FindOptions::default()))
        .collect();
    store.flush();

    assert_eq!(
        adapter.calls(),
        vec![Call::FindMany {
            kind: "post".into(),
            ids: vec!["1".into(), "2".into(), "3".into()],
        }]
    );
    for (deferred, id) in pending.iter().zip(["1", "2", "3"]) {
        let record = deferred.value().unwrap();
        assert_eq!(record.id().as_deref(), Some(id));
    }
}

#[test]
fn without_coalescing_each_record_is_fetched_in_order() {
    let adapter = posts(RecordingAdapter::new());
    let mut store = support::store(&adapter);

    let all = store.find_many("post", ["1", "2", "3"]);
    let records = store.settle(&all).unwrap();

    assert_eq!(
        adapter.calls(),
        vec![
            find_record("post", "1"),
            find_record("post", "2"),
            find_record("post", "3"),
        ]
    );
    let ids: Vec<_> = records.iter().filter_map(|record| record.id()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[test]
fn groups_are_split_by_the_adapter() {
    let adapter = posts(RecordingAdapter::new().coalescing().with_group_size(2));
    let mut store = support::store(&adapter);

    let all = store.find_many("post", ["1", "2", "3"]);
    store.settle(&all).unwrap();

    assert_eq!(
        adapter.calls(),
        vec![
            Call::FindMany {
                kind: "post".into(),
                ids: vec!["1".into(), "2".into()],
            },
            find_record("post", "3"),
        ]
    );
}

#[test]
fn records_missing_from_a_batch_are_rejected() {
    let adapter = posts(RecordingAdapter::new().coalescing());
    adapter.omit_from_batch("2");
    let mut store = support::store(&adapter);

    let one = store.find_record(("post", "1"), FindOptions::default());
    let two = store.find_record(("post", "2"), FindOptions::default());
    let three = store.find_record(("post", "3"), FindOptions::default());
    store.flush();

    assert!(one.value().is_some());
    assert!(three.value().is_some());
    assert!(matches!(two.error(), Some(StoreError::MissingFromPayload(_))));
    assert!(store.peek_record(("post", "2")).is_none());

    let diagnostics = store.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingFromPayload);
    assert!(diagnostics[0].message.contains("\"2\""));
}

#[test]
fn failed_fetch_of_an_unloaded_record_unloads_it() {
    let adapter = RecordingAdapter::new();
    adapter.fail_find(
        "post",
        "9",
        AdapterError::Server {
            status: 500,
            message: "boom".into(),
        },
    );
    let mut store = support::store(&adapter);

    let found = store.find_record(("post", "9"), FindOptions::default());
    let error = store.settle(&found).unwrap_err();

    assert!(matches!(error, StoreError::Adapter(AdapterError::Server { status: 500, .. })));
    assert!(store.peek_identifier(("post", "9")).is_none());
    assert_eq!(store.diagnostics()[0].kind, DiagnosticKind::FetchFailed);
}

#[test]
fn a_find_after_a_failure_tries_again() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);

    let missing = store.find_record(("post", "1"), FindOptions::default());
    assert!(store.settle(&missing).is_err());

    adapter.set_resource(json!({ "type": "post", "id": "1", "attributes": { "title": "Late" } }));
    let found = store.find_record(("post", "1"), FindOptions::default());
    let record = store.settle(&found).unwrap();

    assert_eq!(store.attr(&record, "title"), Some(json!("Late")));
    assert_eq!(adapter.calls().len(), 2);
}

#[test]
fn reload_refetches_a_cached_record() {
    let adapter = posts(RecordingAdapter::new());
    let mut store = support::store(&adapter);
    store
        .push(NormalizedDocument::single(
            ResourceObject::new("post", "1").with_attribute("title", json!("Stale")),
        ))
        .unwrap();

    let reloaded = store.find_record(("post", "1"), FindOptions::new().reload());
    assert!(store.is_reloading(("post", "1")));
    let record = store.settle(&reloaded).unwrap();

    assert_eq!(adapter.calls(), vec![find_record("post", "1")]);
    assert_eq!(store.attr(&record, "title"), Some(json!("One")));
    assert!(!store.is_reloading(("post", "1")));
}

#[test]
fn cached_records_resolve_before_a_background_reload() {
    let adapter = posts(RecordingAdapter::new().with_background_reload());
    let mut store = support::store(&adapter);
    store
        .push(NormalizedDocument::single(
            ResourceObject::new("post", "1").with_attribute("title", json!("Stale")),
        ))
        .unwrap();

    let found = store.find_record(("post", "1"), FindOptions::default());
    assert!(found.is_settled());
    assert!(adapter.calls().is_empty());

    store.flush();
    assert_eq!(adapter.calls(), vec![find_record("post", "1")]);
    assert_eq!(store.attr(("post", "1"), "title"), Some(json!("One")));
}

#[test]
fn background_reload_can_be_turned_off_per_call() {
    let adapter = posts(RecordingAdapter::new().with_background_reload());
    let mut store = support::store(&adapter);
    store
        .push(NormalizedDocument::single(ResourceObject::new("post", "1")))
        .unwrap();

    let found = store.find_record(("post", "1"), FindOptions::new().background_reload(false));
    store.settle(&found).unwrap();
    assert!(adapter.calls().is_empty());
}

#[test]
fn preload_fills_attributes_before_the_fetch_lands() {
    let adapter = posts(RecordingAdapter::new());
    let mut store = support::store(&adapter);

    let mut preload = serde_json::Map::new();
    preload.insert("title".into(), json!("Preloaded"));
    preload.insert("author".into(), json!("7"));
    let found = store.find_record(("post", "1"), FindOptions::new().preload(preload));

    assert_eq!(store.attr(("post", "1"), "title"), Some(json!("Preloaded")));
    assert!(store.peek_identifier(("person", "7")).is_some());

    store.settle(&found).unwrap();
    assert_eq!(store.attr(("post", "1"), "title"), Some(json!("One")));
}

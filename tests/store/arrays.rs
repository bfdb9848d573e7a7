use std::cell::RefCell;
use std::rc::Rc;

use record_cache::{
    ArrayId, FindAllOptions, NormalizedDocument, RequestOptions, ResourceObject, Store,
};
use serde_json::json;

use crate::support::{self, Call, RecordingAdapter};

fn ids(store: &mut Store, array: ArrayId) -> Vec<String> {
    store
        .records(array)
        .iter()
        .filter_map(|record| record.id())
        .collect()
}

fn push_posts(store: &mut Store, ids: &[&str]) {
    let resources = ids.iter().map(|id| ResourceObject::new("post", *id)).collect();
    store.push(NormalizedDocument::many(resources)).unwrap();
}

#[test]
fn live_array_follows_the_cache() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_posts(&mut store, &["1", "2"]);

    let posts = store.peek_all("post");
    assert_eq!(ids(&mut store, posts), ["1", "2"]);
    assert_eq!(store.peek_all("post"), posts);

    push_posts(&mut store, &["3"]);
    store.flush();
    assert_eq!(ids(&mut store, posts), ["1", "2", "3"]);

    store.unload_record(("post", "2")).unwrap();
    store.flush();
    assert_eq!(ids(&mut store, posts), ["1", "3"]);
}

#[test]
fn new_records_join_and_deleted_records_leave() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_posts(&mut store, &["1"]);
    let posts = store.peek_all("post");

    let draft = store.create_record("post", json!({ "title": "Draft" })).unwrap();
    store.flush();
    assert_eq!(store.record_array(posts).unwrap().len(), 2);
    assert!(store.record_array(posts).unwrap().contains(&draft.lid()));

    store.delete_record(&draft).unwrap();
    store.flush();
    assert_eq!(ids(&mut store, posts), ["1"]);
    assert!(!store.record_array(posts).unwrap().contains(&draft.lid()));
}

#[test]
fn find_all_fetches_when_nothing_is_cached() {
    let adapter = RecordingAdapter::new()
        .with_resource("post", "1", json!({ "title": "One" }))
        .with_resource("post", "2", json!({ "title": "Two" }));
    let mut store = support::store(&adapter);

    let found = store.find_all("post", FindAllOptions::default());
    let posts = store.settle(&found).unwrap();

    assert_eq!(adapter.calls(), vec![Call::FindAll { kind: "post".into() }]);
    let array = store.record_array(posts).unwrap();
    assert!(array.is_loaded());
    assert!(!array.is_updating());
    assert_eq!(ids(&mut store, posts), ["1", "2"]);
}

#[test]
fn find_all_uses_the_cache_when_it_has_records() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_posts(&mut store, &["1"]);

    let found = store.find_all("post", FindAllOptions::default());
    assert!(found.is_settled());
    store.flush();
    assert!(adapter.calls().is_empty());

    let reloaded = store.find_all("post", FindAllOptions::new().reload());
    let posts = store.settle(&reloaded).unwrap();
    assert_eq!(adapter.calls(), vec![Call::FindAll { kind: "post".into() }]);
    assert_eq!(ids(&mut store, posts), ["1"]);
}

#[test]
fn query_arrays_hold_the_response_only() {
    let adapter = RecordingAdapter::new().with_query_result(
        "post",
        json!({
            "data": [{ "type": "post", "id": "2" }, { "type": "post", "id": "1" }],
            "meta": { "total": 2 }
        }),
    );
    let mut store = support::store(&adapter);

    let queried = store.query("post", json!({ "filter": "recent" }), RequestOptions::default());
    let results = store.settle(&queried).unwrap();

    assert_eq!(ids(&mut store, results), ["2", "1"]);
    let array = store.record_array(results).unwrap();
    assert!(!array.is_live());
    assert_eq!(array.query(), Some(&json!({ "filter": "recent" })));
    assert_eq!(array.meta(), Some(&json!({ "total": 2 })));

    push_posts(&mut store, &["3"]);
    store.flush();
    assert_eq!(ids(&mut store, results), ["2", "1"]);

    store.unload_record(("post", "2")).unwrap();
    assert_eq!(ids(&mut store, results), ["1"]);
}

#[test]
fn updating_a_query_array_reruns_the_query() {
    let adapter = RecordingAdapter::new()
        .with_query_result("post", json!({ "data": [{ "type": "post", "id": "1" }] }));
    let mut store = support::store(&adapter);

    let queried = store.query("post", json!({ "page": 1 }), RequestOptions::default());
    let results = store.settle(&queried).unwrap();
    let updated = store.update_record_array(results);
    assert!(store.record_array(results).unwrap().is_updating());
    store.settle(&updated).unwrap();

    let query = Call::Query {
        kind: "post".into(),
        query: json!({ "page": 1 }),
    };
    assert_eq!(adapter.calls(), vec![query.clone(), query]);
}

#[test]
fn query_record_resolves_to_the_first_record() {
    let adapter = RecordingAdapter::new().with_query_result(
        "person",
        json!({ "data": { "type": "person", "id": "5", "attributes": { "name": "Ada" } } }),
    );
    let mut store = support::store(&adapter);

    let queried = store.query_record("person", json!({ "email": "ada@example.com" }), RequestOptions::default());
    let person = store.settle(&queried).unwrap().unwrap();
    assert_eq!(store.attr(&person, "name"), Some(json!("Ada")));
}

#[test]
fn observers_see_membership_changes() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let posts = store.peek_all("post");

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let observer = store.observe_record_array(posts, move |change| {
        log.borrow_mut().push((change.added.len(), change.removed.len()));
    });

    push_posts(&mut store, &["1", "2"]);
    store.flush();
    store.unload_record(("post", "1")).unwrap();
    store.flush();
    assert_eq!(*seen.borrow(), [(2, 0), (0, 1)]);

    assert!(store.unobserve_record_array(observer));
    push_posts(&mut store, &["3"]);
    store.flush();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn models_know_their_arrays() {
    let adapter = RecordingAdapter::new()
        .with_query_result("post", json!({ "data": [{ "type": "post", "id": "1" }] }));
    let mut store = support::store(&adapter);
    let posts = store.peek_all("post");
    let queried = store.query("post", json!({}), RequestOptions::default());
    let results = store.settle(&queried).unwrap();

    let identifier = store.peek_identifier(("post", "1")).unwrap();
    let model = store
        .identity_map()
        .get(identifier.kind(), identifier.lid())
        .unwrap();
    assert!(model.record_arrays().contains(&posts));
    assert!(model.record_arrays().contains(&results));

    assert!(store.destroy_record_array(results));
    let model = store
        .identity_map()
        .get(identifier.kind(), identifier.lid())
        .unwrap();
    assert!(!model.record_arrays().contains(&results));
}

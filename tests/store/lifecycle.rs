use record_cache::{
    AdapterError, FindOptions, NormalizedDocument, RecordState, RequestOptions, ResourceObject,
    StoreError, ValidationError, ValidationErrors,
};
use serde_json::json;

use crate::support::{self, Call, RecordingAdapter};

fn push_post(store: &mut record_cache::Store, id: &str, title: &str) -> record_cache::RecordHandle {
    store
        .push(NormalizedDocument::single(
            ResourceObject::new("post", id).with_attribute("title", json!(title)),
        ))
        .unwrap()
        .one()
        .unwrap()
}

#[test]
fn editing_and_saving_an_existing_record() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    assert!(store.set_attr(&post, "title", json!("Hello, world")).unwrap());
    assert_eq!(store.state(&post), Some(RecordState::UpdatedUncommitted));
    assert_eq!(
        store.changed_attributes(&post).unwrap().get("title"),
        Some(&(json!("Hello"), json!("Hello, world")))
    );

    let saved = store.save_record(&post, RequestOptions::default()).unwrap();
    assert_eq!(store.state(&post), Some(RecordState::UpdatedInFlight));
    store.settle(&saved).unwrap();

    assert_eq!(
        adapter.calls(),
        vec![Call::UpdateRecord {
            kind: "post".into(),
            id: "1".into(),
        }]
    );
    assert_eq!(store.state(&post), Some(RecordState::Saved));
    assert!(store.changed_attributes(&post).unwrap().is_empty());
    assert_eq!(store.attr(&post, "title"), Some(json!("Hello, world")));
}

#[test]
fn setting_an_attribute_back_to_its_original_value_cleans_the_record() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    store.set_attr(&post, "title", json!("Changed")).unwrap();
    store.set_attr(&post, "title", json!("Hello")).unwrap();

    assert_eq!(store.state(&post), Some(RecordState::Saved));
    assert!(!store.has_dirty_attributes(&post));
}

#[test]
fn unknown_attributes_are_rejected() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    let error = store.set_attr(&post, "subtitle", json!("x")).unwrap_err();
    assert!(matches!(error, StoreError::UnknownAttribute { .. }));

    let error = store
        .create_record("post", json!({ "subtitle": "x" }))
        .unwrap_err();
    assert!(matches!(error, StoreError::UnknownAttribute { .. }));
}

#[test]
fn invalid_save_round_trip() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    store.set_attr(&post, "title", json!("")).unwrap();
    adapter.fail_next_save(AdapterError::Invalid(ValidationErrors::new(vec![
        ValidationError::new("title", "can't be blank"),
    ])));
    let saved = store.save_record(&post, RequestOptions::default()).unwrap();
    let error = store.settle(&saved).unwrap_err();

    assert!(error.validation_errors().is_some());
    assert!(matches!(store.state(&post), Some(RecordState::Invalid(_))));
    let errors = store.errors(&post).unwrap();
    assert_eq!(errors.get("title"), ["can't be blank".to_string()]);
    assert_eq!(store.attr(&post, "title"), Some(json!("")));

    store.set_attr(&post, "title", json!("Fixed")).unwrap();
    assert!(store.errors(&post).unwrap().is_empty());
    assert_eq!(store.state(&post), Some(RecordState::UpdatedUncommitted));

    let saved = store.save_record(&post, RequestOptions::default()).unwrap();
    store.settle(&saved).unwrap();
    assert_eq!(store.state(&post), Some(RecordState::Saved));
    assert_eq!(store.attr(&post, "title"), Some(json!("Fixed")));
}

#[test]
fn failed_save_keeps_local_changes() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    store.set_attr(&post, "title", json!("Edited")).unwrap();
    adapter.fail_next_save(AdapterError::Timeout);
    let saved = store.save_record(&post, RequestOptions::default()).unwrap();
    let error = store.settle(&saved).unwrap_err();

    assert_eq!(error, StoreError::Adapter(AdapterError::Timeout));
    assert!(store.state(&post).unwrap().is_error());
    assert_eq!(store.attr(&post, "title"), Some(json!("Edited")));
    assert!(store.has_dirty_attributes(&post));
}

#[test]
fn records_cannot_change_while_saving() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    store.set_attr(&post, "title", json!("Edited")).unwrap();
    let saved = store.save_record(&post, RequestOptions::default()).unwrap();

    let error = store.set_attr(&post, "title", json!("Again")).unwrap_err();
    assert!(matches!(error, StoreError::InFlightMutation { .. }));
    assert!(store.unload_record(&post).is_err());

    store.settle(&saved).unwrap();
    assert!(store.set_attr(&post, "title", json!("Again")).unwrap());
}

#[test]
fn deleting_and_saving() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    let destroyed = store.destroy_record(&post, RequestOptions::default()).unwrap();
    assert_eq!(store.state(&post), Some(RecordState::DeletedInFlight));
    store.settle(&destroyed).unwrap();

    assert_eq!(
        adapter.calls(),
        vec![Call::DeleteRecord {
            kind: "post".into(),
            id: "1".into(),
        }]
    );
    assert_eq!(store.state(&post), Some(RecordState::DeletedSaved));
    assert!(store.peek_record(("post", "1")).is_some());
}

#[test]
fn deleting_a_new_record_needs_no_request() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let draft = store.create_record("post", json!({ "title": "Draft" })).unwrap();

    let destroyed = store.destroy_record(&draft, RequestOptions::default()).unwrap();
    assert!(destroyed.is_settled());
    assert_eq!(store.state(&draft), Some(RecordState::DeletedSaved));
    store.flush();
    assert!(adapter.calls().is_empty());
}

#[test]
fn rollback_restores_canonical_values() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let post = push_post(&mut store, "1", "Hello");

    store.set_attr(&post, "title", json!("Edited")).unwrap();
    store.rollback_attributes(&post).unwrap();

    assert_eq!(store.attr(&post, "title"), Some(json!("Hello")));
    assert_eq!(store.state(&post), Some(RecordState::Saved));
}

#[test]
fn rolling_back_a_new_record_discards_it() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let draft = store.create_record("post", json!({ "title": "Draft" })).unwrap();

    store.rollback_attributes(&draft).unwrap();
    assert_eq!(store.state(&draft), Some(RecordState::DeletedSaved));
}

#[test]
#[should_panic(expected = "already been used")]
fn client_ids_must_be_unique() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1", "Hello");
    let _ = store.create_record("post", json!({ "id": "1" }));
}

#[test]
fn unload_all_keeps_records_being_saved() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let saving = push_post(&mut store, "1", "Hello");
    push_post(&mut store, "2", "World");

    store.set_attr(&saving, "title", json!("Edited")).unwrap();
    let saved = store.save_record(&saving, RequestOptions::default()).unwrap();
    store.unload_all(Some("post"));

    assert!(store.peek_record(("post", "1")).is_some());
    assert!(store.peek_record(("post", "2")).is_none());
    store.settle(&saved).unwrap();
}

#[test]
fn destroying_the_store_rejects_pending_work() {
    let adapter = RecordingAdapter::new().with_resource("post", "1", json!({}));
    let mut store = support::store(&adapter);

    let pending = store.find_record(("post", "1"), FindOptions::default());
    store.destroy();

    assert_eq!(pending.error(), Some(StoreError::StoreDestroyed));
    assert!(store.is_destroyed());
    assert!(adapter.calls().is_empty());
}

#[test]
#[should_panic(expected = "destroyed store")]
fn a_destroyed_store_cannot_be_used() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    store.destroy();
    store.peek_all("post");
}

use std::cell::RefCell;
use std::rc::Rc;

use record_cache::{
    NormalizedDocument, NotificationKind, RequestOptions, ResourceObject, Store, StoreError,
};
use serde_json::json;

use crate::support::{self, RecordingAdapter};

type Log = Rc<RefCell<Vec<(NotificationKind, Option<String>)>>>;

fn listen(store: &mut Store, id: &str) -> Log {
    let log: Log = Rc::default();
    let sink = log.clone();
    store
        .subscribe(("post", id), move |_, kind, key| {
            sink.borrow_mut().push((kind, key.map(str::to_string)));
        })
        .unwrap();
    log
}

fn push_post(store: &mut Store, id: &str) {
    store
        .push(NormalizedDocument::single(
            ResourceObject::new("post", id).with_attribute("title", json!("Hello")),
        ))
        .unwrap();
}

#[test]
fn editing_notifies_the_attribute_then_the_state() {
    support::init_tracing();
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1");
    let log = listen(&mut store, "1");

    store.set_attr(("post", "1"), "title", json!("Edited")).unwrap();
    store.set_attr(("post", "1"), "body", json!("Text")).unwrap();

    assert_eq!(
        *log.borrow(),
        [
            (NotificationKind::Attributes, Some("title".to_string())),
            (NotificationKind::State, None),
            (NotificationKind::Attributes, Some("body".to_string())),
        ]
    );
}

#[test]
fn writing_the_same_value_is_silent() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1");
    let log = listen(&mut store, "1");

    assert!(!store.set_attr(("post", "1"), "title", json!("Hello")).unwrap());
    assert!(log.borrow().is_empty());
}

#[test]
fn saving_reports_state_changes() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1");
    store.set_attr(("post", "1"), "title", json!("Edited")).unwrap();
    let log = listen(&mut store, "1");

    let saved = store.save_record(("post", "1"), RequestOptions::default()).unwrap();
    store.settle(&saved).unwrap();

    let states = log
        .borrow()
        .iter()
        .filter(|(kind, _)| *kind == NotificationKind::State)
        .count();
    assert_eq!(states, 2, "in flight, then saved");
}

#[test]
fn unsubscribed_callbacks_are_not_called() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1");

    let log: Log = Rc::default();
    let sink = log.clone();
    let token = store
        .subscribe(("post", "1"), move |_, kind, _| sink.borrow_mut().push((kind, None)))
        .unwrap();
    assert!(store.unsubscribe(token));
    assert!(!store.unsubscribe(token));

    store.set_attr(("post", "1"), "title", json!("Edited")).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn unloading_sends_a_final_notification() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    push_post(&mut store, "1");
    let log = listen(&mut store, "1");

    store.unload_record(("post", "1")).unwrap();
    assert_eq!(log.borrow().last(), Some(&(NotificationKind::Unload, None)));

    let seen = log.borrow().len();
    push_post(&mut store, "1");
    store.set_attr(("post", "1"), "title", json!("Again")).unwrap();
    assert_eq!(log.borrow().len(), seen);
}

#[test]
fn new_ids_are_announced_as_identity_changes() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);
    let draft = store.create_record("post", json!({ "title": "Draft" })).unwrap();

    let log: Log = Rc::default();
    let sink = log.clone();
    store
        .subscribe(&draft, move |identifier, kind, _| {
            sink.borrow_mut().push((kind, identifier.id().map(str::to_string)));
        })
        .unwrap();

    let saved = store.save_record(&draft, RequestOptions::default()).unwrap();
    store.settle(&saved).unwrap();

    assert!(log
        .borrow()
        .contains(&(NotificationKind::Identity, Some("server-1".to_string()))));
}

#[test]
fn subscribing_needs_a_known_record() {
    let adapter = RecordingAdapter::new();
    let mut store = support::store(&adapter);

    let error = store.subscribe(("post", "404"), |_, _, _| {}).unwrap_err();
    assert!(matches!(error, StoreError::RecordNotFound(_)));
}

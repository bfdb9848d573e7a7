//! Shared fixtures for the store integration tests: a scripted adapter that
//! records every call, and a blog schema.

#![allow(dead_code)]

pub mod adapter;

use record_cache::{ModelSchema, Store, StoreBuilder};

pub use adapter::{Call, RecordingAdapter};

/// Route store logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// `post`, `person` and `comment`, wired together.
pub fn blog() -> StoreBuilder {
    Store::builder()
        .with_model(
            "post",
            ModelSchema::new()
                .attr("title")
                .attr("body")
                .belongs_to("author", "person")
                .has_many("comments", "comment"),
        )
        .with_model("person", ModelSchema::new().attr("name"))
        .with_model(
            "comment",
            ModelSchema::new().attr("body").belongs_to("post", "post"),
        )
}

pub fn store(adapter: &RecordingAdapter) -> Store {
    init_tracing();
    blog().with_adapter(adapter.clone()).build()
}

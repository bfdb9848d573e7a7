//! Payload normalization and record serialization.

use serde_json::{json, Map, Value};
use tracing::trace;

use crate::adapter::RequestType;
use crate::document::{NormalizedDocument, PrimaryData};
use crate::error::SerializerError;
use crate::schema::RelationshipKind;
use crate::snapshot::{BelongsTo, Snapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub include_id: bool,
}

impl SerializeOptions {
    pub fn include_id() -> Self {
        SerializeOptions { include_id: true }
    }
}

pub trait Serializer {
    /// Turn an adapter payload into a normalized document. `id` is the id the
    /// store asked for, when there was one.
    fn normalize_response(
        &self,
        kind: &str,
        payload: Value,
        id: Option<&str>,
        request_type: RequestType,
    ) -> Result<NormalizedDocument, SerializerError>;

    fn serialize(&self, snapshot: &Snapshot<'_>, options: &SerializeOptions) -> Result<Value, SerializerError>;

    /// Normalization used by `push_payload`: a document of any shape.
    fn normalize(&self, kind: &str, payload: Value) -> Result<NormalizedDocument, SerializerError> {
        parse_document(kind, payload)
    }
}

fn parse_document(kind: &str, payload: Value) -> Result<NormalizedDocument, SerializerError> {
    if payload.is_null() {
        return Ok(NormalizedDocument::default());
    }
    serde_json::from_value(payload).map_err(|err| SerializerError::Normalize {
        kind: kind.to_string(),
        message: err.to_string(),
    })
}

/// Reads and writes JSON:API documents as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonApiSerializer;

impl Serializer for JsonApiSerializer {
    fn normalize_response(
        &self,
        kind: &str,
        payload: Value,
        _id: Option<&str>,
        request_type: RequestType,
    ) -> Result<NormalizedDocument, SerializerError> {
        let document = parse_document(kind, payload)?;
        let mismatch = match &document.data {
            Some(PrimaryData::Many(_)) => request_type.expects_single(),
            Some(PrimaryData::One(_)) => !request_type.expects_single(),
            None => false,
        };
        if mismatch {
            let expected = if request_type.expects_single() {
                "a single object or null"
            } else {
                "an array"
            };
            return Err(SerializerError::Normalize {
                kind: kind.to_string(),
                message: format!(
                    "expected the primary data of a {} response to be {}",
                    request_type, expected
                ),
            });
        }
        trace!(kind, %request_type, resources = document.primary().len(), "normalized response");
        Ok(document)
    }

    fn serialize(&self, snapshot: &Snapshot<'_>, options: &SerializeOptions) -> Result<Value, SerializerError> {
        let mut resource = Map::new();
        resource.insert("type".into(), Value::String(snapshot.kind().to_string()));
        if options.include_id {
            if let Some(id) = snapshot.id() {
                resource.insert("id".into(), Value::String(id.to_string()));
            }
        }
        resource.insert("attributes".into(), Value::Object(snapshot.attributes().clone()));

        let mut relationships = Map::new();
        for (name, kind) in snapshot.relationship_names() {
            let data = match kind {
                RelationshipKind::BelongsTo => match snapshot.belongs_to(&name) {
                    BelongsTo::Unknown => continue,
                    BelongsTo::Empty => Value::Null,
                    BelongsTo::Record(related) => reference(&related),
                },
                RelationshipKind::HasMany => match snapshot.has_many(&name) {
                    None => continue,
                    Some(related) => Value::Array(
                        related
                            .iter()
                            .filter(|related| related.id().is_some())
                            .map(|related| reference(related))
                            .collect(),
                    ),
                },
            };
            relationships.insert(name, json!({ "data": data }));
        }
        if !relationships.is_empty() {
            resource.insert("relationships".into(), Value::Object(relationships));
        }

        Ok(json!({ "data": resource }))
    }
}

fn reference(snapshot: &Snapshot<'_>) -> Value {
    match snapshot.id() {
        Some(id) => json!({ "type": snapshot.kind(), "id": id }),
        None => json!({ "type": snapshot.kind(), "lid": snapshot.lid() }),
    }
}

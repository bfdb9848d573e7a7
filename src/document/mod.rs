//! The normalized resource-document shape the store operates on.
//!
//! Serializers turn adapter payloads into a [`NormalizedDocument`]; the store
//! only ever pushes normalized documents. The shape follows JSON:API: primary
//! `data` (one resource, many resources or `null`), `included` side-loads, and
//! optional `meta`/`links`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::identifier::Lid;

/// Normalize a server id: empty strings mean "no id".
pub fn coerce_id(id: impl Into<String>) -> Option<String> {
    let id = id.into();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Ids may arrive as strings or numbers; both are stored as strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(coerce_id(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}

/// Distinguishes an explicit `null` from an absent key: a present field always
/// deserializes to `Some`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Reference to a resource: `{ type, id }` or `{ type, lid }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<Lid>,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ResourceRef {
            kind: kind.into(),
            id: coerce_id(id),
            lid: None,
        }
    }
}

/// Relationship linkage: a single (possibly empty) reference or a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceRef>),
    One(Option<ResourceRef>),
}

/// A link is either a bare URL or an object with `href` and `meta`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    Href(String),
    Object {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Value>,
    },
}

impl Link {
    pub fn href(&self) -> &str {
        match self {
            Link::Href(href) => href,
            Link::Object { href, .. } => href,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<String, Link>);

impl Links {
    pub fn get(&self, name: &str) -> Option<&Link> {
        self.0.get(name)
    }

    pub fn related(&self) -> Option<&str> {
        self.get("related").map(Link::href)
    }

    pub fn insert(&mut self, name: impl Into<String>, link: Link) {
        self.0.insert(name.into(), link);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Relationship payload. An absent `data` key means the linkage is unknown;
/// `data: null` means the relationship is known to be empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipObject {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Linkage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl RelationshipObject {
    pub fn one(reference: Option<ResourceRef>) -> Self {
        RelationshipObject {
            data: Some(Linkage::One(reference)),
            ..Default::default()
        }
    }

    pub fn many(references: Vec<ResourceRef>) -> Self {
        RelationshipObject {
            data: Some(Linkage::Many(references)),
            ..Default::default()
        }
    }
}

/// One normalized resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<Lid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, RelationshipObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl ResourceObject {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ResourceObject {
            kind: kind.into(),
            id: coerce_id(id),
            lid: None,
            attributes: None,
            relationships: None,
            meta: None,
            links: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_relationship(
        mut self,
        key: impl Into<String>,
        relationship: RelationshipObject,
    ) -> Self {
        self.relationships
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), relationship);
        self
    }
}

/// Primary data of a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Option<Box<ResourceObject>>),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<PrimaryData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl NormalizedDocument {
    pub fn single(resource: ResourceObject) -> Self {
        NormalizedDocument {
            data: Some(PrimaryData::One(Some(Box::new(resource)))),
            ..Default::default()
        }
    }

    pub fn many(resources: Vec<ResourceObject>) -> Self {
        NormalizedDocument {
            data: Some(PrimaryData::Many(resources)),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        NormalizedDocument {
            data: Some(PrimaryData::One(None)),
            ..Default::default()
        }
    }

    pub fn with_included(mut self, included: Vec<ResourceObject>) -> Self {
        self.included = included;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// All primary resources, in document order.
    pub fn primary(&self) -> Vec<&ResourceObject> {
        match &self.data {
            Some(PrimaryData::Many(resources)) => resources.iter().collect(),
            Some(PrimaryData::One(Some(resource))) => vec![resource.as_ref()],
            Some(PrimaryData::One(None)) | None => Vec::new(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.data, Some(PrimaryData::Many(_)))
    }
}

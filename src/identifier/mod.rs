//! Stable record identifiers.
//!
//! Every logical entity the store knows about is addressed by exactly one
//! [`RecordIdentifier`]. The identifier's `lid` is assigned once, when the
//! identifier is created, and never changes; the server `id` may be filled in
//! later (after the first save). All internal tables are keyed by [`Lid`].

mod cache;

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::document::{ResourceObject, ResourceRef};

pub use cache::{IdentifierUpdate, IdentityCache};

/// Client-generated, process-unique local identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lid(String);

impl Lid {
    pub fn new(value: impl Into<String>) -> Self {
        Lid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Lid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Lid {
    fn from(value: &str) -> Self {
        Lid(value.to_string())
    }
}

impl From<String> for Lid {
    fn from(value: String) -> Self {
        Lid(value)
    }
}

/// A stable identifier for one record.
///
/// Equality and hashing only consider the `lid`: two values describing the same
/// identifier are equal even if one of them was captured before the server id
/// was assigned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordIdentifier {
    lid: Lid,
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
}

impl RecordIdentifier {
    pub(crate) fn new(lid: Lid, kind: impl Into<String>, id: Option<String>) -> Self {
        RecordIdentifier {
            lid,
            kind: kind.into(),
            id,
        }
    }

    pub fn lid(&self) -> &Lid {
        &self.lid
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    /// A resource key that resolves back to this identifier.
    pub fn to_key(&self) -> ResourceKey {
        ResourceKey {
            kind: Some(self.kind.clone()),
            id: self.id.clone(),
            lid: Some(self.lid.clone()),
        }
    }
}

impl PartialEq for RecordIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.lid == other.lid
    }
}

impl Eq for RecordIdentifier {}

impl Hash for RecordIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lid.hash(state);
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "<{}:{}>", self.kind, id),
            None => write!(f, "<{}:{}>", self.kind, self.lid),
        }
    }
}

/// Resource reference accepted by the store's public surface.
///
/// Either `lid` alone (for an identifier the store already knows) or a `kind`
/// plus optional `id`/`lid`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceKey {
    pub kind: Option<String>,
    pub id: Option<String>,
    pub lid: Option<Lid>,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ResourceKey {
            kind: Some(kind.into()),
            id: crate::document::coerce_id(id.into()),
            lid: None,
        }
    }

    pub fn from_lid(lid: impl Into<Lid>) -> Self {
        ResourceKey {
            kind: None,
            id: None,
            lid: Some(lid.into()),
        }
    }

    pub fn with_lid(mut self, lid: impl Into<Lid>) -> Self {
        self.lid = Some(lid.into());
        self
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.as_deref().unwrap_or("?");
        match (&self.id, &self.lid) {
            (Some(id), _) => write!(f, "<{}:{}>", kind, id),
            (None, Some(lid)) => write!(f, "<{}:{}>", kind, lid),
            (None, None) => write!(f, "<{}:?>", kind),
        }
    }
}

impl From<(&str, &str)> for ResourceKey {
    fn from((kind, id): (&str, &str)) -> Self {
        ResourceKey::new(kind, id)
    }
}

impl From<(&str, String)> for ResourceKey {
    fn from((kind, id): (&str, String)) -> Self {
        ResourceKey::new(kind, id)
    }
}

impl From<&RecordIdentifier> for ResourceKey {
    fn from(identifier: &RecordIdentifier) -> Self {
        identifier.to_key()
    }
}

impl From<RecordIdentifier> for ResourceKey {
    fn from(identifier: RecordIdentifier) -> Self {
        ResourceKey {
            kind: Some(identifier.kind),
            id: identifier.id,
            lid: Some(identifier.lid),
        }
    }
}

impl From<&ResourceRef> for ResourceKey {
    fn from(reference: &ResourceRef) -> Self {
        ResourceKey {
            kind: Some(reference.kind.clone()),
            id: reference.id.clone(),
            lid: reference.lid.clone(),
        }
    }
}

impl From<&ResourceObject> for ResourceKey {
    fn from(resource: &ResourceObject) -> Self {
        ResourceKey {
            kind: Some(resource.kind.clone()),
            id: resource.id.clone(),
            lid: resource.lid.clone(),
        }
    }
}

impl From<Lid> for ResourceKey {
    fn from(lid: Lid) -> Self {
        ResourceKey::from_lid(lid)
    }
}

impl From<&Lid> for ResourceKey {
    fn from(lid: &Lid) -> Self {
        ResourceKey::from_lid(lid.clone())
    }
}

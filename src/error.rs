//! Error types for the record cache.
//!
//! Request failures are values ([`StoreError`]) delivered through the caller's
//! [`Deferred`](crate::Deferred). Programmer misuse (missing type, unknown
//! model, using a destroyed store) is a panic instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::RecordIdentifier;
use crate::record::RecordState;
use crate::record_array::ArrayId;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Bucket for validation messages not scoped to one attribute.
pub const BASE_ERROR_KEY: &str = "base";

/// One server-side validation message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Attribute the message belongs to; `None` lands in the `base` bucket.
    pub attribute: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            attribute: Some(attribute.into()),
            message: message.into(),
        }
    }

    pub fn base(message: impl Into<String>) -> Self {
        ValidationError {
            attribute: None,
            message: message.into(),
        }
    }

    /// Build from a JSON:API `source.pointer` such as `/data/attributes/title`.
    pub fn from_pointer(pointer: &str, message: impl Into<String>) -> Self {
        let attribute = pointer
            .strip_prefix("/data/attributes/")
            .or_else(|| pointer.strip_prefix("/data/relationships/"))
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        ValidationError {
            attribute,
            message: message.into(),
        }
    }

    pub fn key(&self) -> &str {
        self.attribute.as_deref().unwrap_or(BASE_ERROR_KEY)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        ValidationErrors(errors)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        ValidationErrors(iter.into_iter().collect())
    }
}

/// Failure reported by an adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The server rejected the record with per-attribute messages.
    #[error("the adapter rejected the commit because it was invalid ({} errors)", .0.len())]
    Invalid(ValidationErrors),
    #[error("the adapter could not find the resource")]
    NotFound,
    #[error("the adapter operation is unauthorized")]
    Unauthorized,
    #[error("the adapter operation is forbidden")]
    Forbidden,
    #[error("the adapter operation failed due to a conflict")]
    Conflict,
    #[error("the adapter operation timed out")]
    Timeout,
    #[error("the adapter operation was aborted")]
    Abort,
    #[error("the adapter operation failed due to a server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("the adapter does not implement `{0}`")]
    Unsupported(&'static str),
    #[error("adapter error: {0}")]
    Other(String),
}

impl AdapterError {
    pub fn is_invalid(&self) -> bool {
        matches!(self, AdapterError::Invalid(_))
    }
}

/// Failure while normalizing a payload or serializing a snapshot.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SerializerError {
    #[error("could not normalize {kind} payload: {message}")]
    Normalize { kind: String, message: String },
    #[error("could not serialize {identifier}: {message}")]
    Serialize {
        identifier: RecordIdentifier,
        message: String,
    },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Serializer(#[from] SerializerError),

    #[error("no record was found for {0}")]
    RecordNotFound(String),

    #[error("expected {0} to be present in the adapter provided payload, but it was not found")]
    MissingFromPayload(RecordIdentifier),

    #[error("attempted to handle event `{event}` on {identifier} while in state {state}")]
    InvalidTransition {
        identifier: RecordIdentifier,
        state: RecordState,
        event: &'static str,
    },

    #[error("cannot set `{key}` on {identifier} while the record is being saved")]
    InFlightMutation {
        identifier: RecordIdentifier,
        key: String,
    },

    #[error("{kind} has no attribute named `{key}`")]
    UnknownAttribute { kind: String, key: String },

    #[error("{kind} has no relationship named `{key}`")]
    UnknownRelationship { kind: String, key: String },

    #[error("{0} was saved to the server, but the response does not have an id")]
    MissingId(RecordIdentifier),

    #[error("record {0} has been unloaded")]
    Unloaded(RecordIdentifier),

    #[error("record array {0} was destroyed")]
    ArrayDestroyed(ArrayId),

    #[error("the store was destroyed before the request settled")]
    StoreDestroyed,

    #[error("the request did not settle after the store's task queue drained")]
    Unsettled,
}

impl StoreError {
    /// Validation messages carried by the underlying adapter error, if any.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            StoreError::Adapter(AdapterError::Invalid(errors)) => Some(errors),
            _ => None,
        }
    }
}

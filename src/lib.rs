mod adapter;
mod deferred;
mod diagnostics;
mod document;
mod error;
mod fetch;
mod identifier;
mod identity_map;
mod notification;
mod record;
mod record_array;
mod registry;
mod scheduler;
mod schema;
mod serializer;
mod snapshot;
mod store;

pub use adapter::{Adapter, AdapterResult, RequestType};
pub use deferred::Deferred;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use document::{
    coerce_id, Link, Links, Linkage, NormalizedDocument, PrimaryData, RelationshipObject,
    ResourceObject, ResourceRef,
};
pub use error::{
    AdapterError, Result, SerializerError, StoreError, ValidationError, ValidationErrors,
    BASE_ERROR_KEY,
};
pub use fetch::{FindAllOptions, FindOptions, RequestOptions, SnapshotOptions};
pub use identifier::{IdentifierUpdate, IdentityCache, Lid, RecordIdentifier, ResourceKey};
pub use identity_map::{IdentityMap, InternalModelMap};
pub use notification::{NotificationKind, SubscriptionToken};
pub use record::{
    DirtyType, InternalModel, RecordErrors, RecordEvent, RecordHandle, RecordState,
    RelationshipData, RelationshipState,
};
pub use record_array::{ArrayChange, ArrayId, ArraySource, ObserverId, RecordArray};
pub use schema::{ModelSchema, RelationshipKind, RelationshipSchema, Schema};
pub use serializer::{JsonApiSerializer, SerializeOptions, Serializer};
pub use snapshot::{BelongsTo, Snapshot, SnapshotRecordArray};
pub use store::{Pushed, RecordReference, Store, StoreBuilder, StoreConfig};

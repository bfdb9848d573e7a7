//! Immutable views of records handed to adapters and serializers.
//!
//! A [`Snapshot`] borrows the store for its lifetime, so the data it reports
//! cannot change while an adapter or serializer holds it. Attribute values
//! are captured up front; related snapshots are built on first access and
//! cached per snapshot.

mod record_array;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::SerializerError;
use crate::fetch::SnapshotOptions;
use crate::identifier::{IdentityCache, Lid, RecordIdentifier};
use crate::identity_map::IdentityMap;
use crate::record::{RecordState, RelationshipData, RelationshipState};
use crate::registry::Registry;
use crate::schema::{RelationshipKind, Schema};
use crate::serializer::SerializeOptions;

pub use record_array::SnapshotRecordArray;

/// Read access to the store's tables while snapshots are alive.
#[derive(Clone, Copy)]
pub struct SnapshotSource<'a> {
    pub(crate) identifiers: &'a IdentityCache,
    pub(crate) models: &'a IdentityMap,
    pub(crate) schema: &'a Schema,
    pub(crate) registry: &'a Registry,
}

impl<'a> SnapshotSource<'a> {
    fn identifier(&self, lid: &Lid) -> Option<&'a RecordIdentifier> {
        self.identifiers.resolve(lid)
    }

    fn is_deleted(&self, identifier: &RecordIdentifier) -> bool {
        self.models
            .get(identifier.kind(), identifier.lid())
            .is_some_and(|model| model.is_deleted())
    }
}

/// The related record of a belongs-to, as seen by a snapshot.
#[derive(Clone)]
pub enum BelongsTo<'a> {
    /// The relationship's linkage has never been loaded.
    Unknown,
    /// Known to be empty, or pointing at a deleted record.
    Empty,
    Record(Rc<Snapshot<'a>>),
}

impl<'a> BelongsTo<'a> {
    pub fn record(&self) -> Option<&Snapshot<'a>> {
        match self {
            BelongsTo::Record(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, BelongsTo::Unknown)
    }
}

impl fmt::Debug for BelongsTo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BelongsTo::Unknown => f.write_str("Unknown"),
            BelongsTo::Empty => f.write_str("Empty"),
            BelongsTo::Record(snapshot) => f.debug_tuple("Record").field(&snapshot.identifier).finish(),
        }
    }
}

pub struct Snapshot<'a> {
    identifier: RecordIdentifier,
    source: SnapshotSource<'a>,
    state: Option<RecordState>,
    attributes: Map<String, Value>,
    changed: BTreeMap<String, (Value, Value)>,
    relationships: BTreeMap<String, RelationshipState>,
    options: SnapshotOptions,
    belongs_to: RefCell<HashMap<String, BelongsTo<'a>>>,
    has_many: RefCell<HashMap<String, Option<Vec<Rc<Snapshot<'a>>>>>>,
}

impl<'a> Snapshot<'a> {
    /// Capture `identifier` as the store currently holds it.
    ///
    /// Every attribute the model declares is present; values the record
    /// never received are `null`.
    pub fn new(identifier: &RecordIdentifier, source: SnapshotSource<'a>, options: SnapshotOptions) -> Self {
        let identifier = source
            .identifier(identifier.lid())
            .cloned()
            .unwrap_or_else(|| identifier.clone());
        let model = source.models.get(identifier.kind(), identifier.lid());

        let mut attributes = Map::new();
        let mut relationships = BTreeMap::new();
        if let Some(schema) = source.schema.get(identifier.kind()) {
            for name in schema.attributes() {
                let value = model
                    .and_then(|model| model.attr(name))
                    .cloned()
                    .unwrap_or(Value::Null);
                attributes.insert(name.clone(), value);
            }
            for (name, _) in schema.relationships() {
                if let Some(state) = model.and_then(|model| model.data().relationship(name)) {
                    relationships.insert(name.to_string(), state);
                }
            }
        }

        Snapshot {
            state: model.map(|model| model.state()),
            changed: model
                .map(|model| model.data().changed_attributes())
                .unwrap_or_default(),
            identifier,
            source,
            attributes,
            relationships,
            options,
            belongs_to: RefCell::new(HashMap::new()),
            has_many: RefCell::new(HashMap::new()),
        }
    }

    pub fn identifier(&self) -> &RecordIdentifier {
        &self.identifier
    }

    pub fn id(&self) -> Option<&str> {
        self.identifier.id()
    }

    pub fn lid(&self) -> &Lid {
        self.identifier.lid()
    }

    pub fn kind(&self) -> &str {
        self.identifier.kind()
    }

    /// Lifecycle state at capture time; `None` if no record was cached.
    pub fn record_state(&self) -> Option<RecordState> {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state.is_some_and(|state| state.is_new())
    }

    pub fn adapter_options(&self) -> Option<&Value> {
        self.options.adapter_options.as_ref()
    }

    pub fn include(&self) -> Option<&str> {
        self.options.include.as_deref()
    }

    /// `None` when the model declares no such attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// `key -> (original, current)` for attributes changed locally.
    pub fn changed_attributes(&self) -> &BTreeMap<String, (Value, Value)> {
        &self.changed
    }

    fn relationship_data(&self, key: &str, expected: RelationshipKind) -> Option<&RelationshipData> {
        let declared = self
            .source
            .schema
            .get(self.kind())
            .and_then(|schema| schema.relationship(key));
        match declared {
            Some(relationship) if relationship.kind == expected => {}
            _ => panic!(
                "{} has no {} relationship named '{}'",
                self.kind(),
                match expected {
                    RelationshipKind::BelongsTo => "belongsTo",
                    RelationshipKind::HasMany => "hasMany",
                },
                key
            ),
        }
        self.relationships.get(key).and_then(|state| state.data.as_ref())
    }

    fn related(&self, lid: &Lid) -> Option<Rc<Snapshot<'a>>> {
        let identifier = self.source.identifier(lid)?;
        if self.source.is_deleted(identifier) {
            return None;
        }
        Some(Rc::new(Snapshot::new(identifier, self.source, SnapshotOptions::default())))
    }

    /// # Panics
    ///
    /// When `key` is not a declared belongs-to relationship.
    pub fn belongs_to(&self, key: &str) -> BelongsTo<'a> {
        if let Some(cached) = self.belongs_to.borrow().get(key) {
            return cached.clone();
        }

        let result = match self.relationship_data(key, RelationshipKind::BelongsTo) {
            None => BelongsTo::Unknown,
            Some(RelationshipData::One(Some(lid))) => match self.related(lid) {
                Some(snapshot) => BelongsTo::Record(snapshot),
                None => BelongsTo::Empty,
            },
            Some(_) => BelongsTo::Empty,
        };
        self.belongs_to
            .borrow_mut()
            .insert(key.to_string(), result.clone());
        result
    }

    /// The related id without building a snapshot: `None` when unknown,
    /// `Some(None)` when empty or the related record has no id yet.
    pub fn belongs_to_id(&self, key: &str) -> Option<Option<String>> {
        match self.relationship_data(key, RelationshipKind::BelongsTo)? {
            RelationshipData::One(Some(lid)) => {
                let identifier = self.source.identifier(lid);
                Some(
                    identifier
                        .filter(|identifier| !self.source.is_deleted(identifier))
                        .and_then(|identifier| identifier.id().map(str::to_string)),
                )
            }
            _ => Some(None),
        }
    }

    /// Related snapshots, deleted records excluded. `None` when unknown.
    ///
    /// # Panics
    ///
    /// When `key` is not a declared has-many relationship.
    pub fn has_many(&self, key: &str) -> Option<Vec<Rc<Snapshot<'a>>>> {
        if let Some(cached) = self.has_many.borrow().get(key) {
            return cached.clone();
        }

        let result = match self.relationship_data(key, RelationshipKind::HasMany) {
            None => None,
            Some(data) => Some(
                data.lids()
                    .into_iter()
                    .filter_map(|lid| self.related(lid))
                    .collect(),
            ),
        };
        self.has_many
            .borrow_mut()
            .insert(key.to_string(), result.clone());
        result
    }

    /// Ids of the related records that have one, deleted records excluded.
    pub fn has_many_ids(&self, key: &str) -> Option<Vec<String>> {
        let data = self.relationship_data(key, RelationshipKind::HasMany)?;
        Some(
            data.lids()
                .into_iter()
                .filter_map(|lid| self.source.identifier(lid))
                .filter(|identifier| !self.source.is_deleted(identifier))
                .filter_map(|identifier| identifier.id().map(str::to_string))
                .collect(),
        )
    }

    /// Declared relationship names with their kinds.
    pub fn relationship_names(&self) -> Vec<(String, RelationshipKind)> {
        self.source
            .schema
            .get(self.kind())
            .map(|schema| {
                schema
                    .relationships()
                    .map(|(name, relationship)| (name.to_string(), relationship.kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialize with the serializer configured for this type.
    pub fn serialize(&self, options: &SerializeOptions) -> Result<Value, SerializerError> {
        self.source
            .registry
            .serializer_for(self.kind())
            .serialize(self, options)
    }
}

impl fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("identifier", &self.identifier)
            .field("state", &self.state)
            .field("attributes", &self.attributes)
            .finish()
    }
}

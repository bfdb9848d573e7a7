use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::{Lid, RecordIdentifier, ResourceKey};

static NEXT_LID: AtomicU64 = AtomicU64::new(1);

/// Outcome of [`IdentityCache::update_record_identifier`].
#[derive(Clone, Debug, PartialEq)]
pub enum IdentifierUpdate {
    /// Nothing new was learned.
    Unchanged(RecordIdentifier),
    /// The identifier received its first server id.
    IdAssigned(RecordIdentifier),
    /// The id already belonged to another identifier. `kept` survives;
    /// `abandoned` is unreachable from now on except through forwarding.
    Merged {
        kept: RecordIdentifier,
        abandoned: RecordIdentifier,
    },
}

impl IdentifierUpdate {
    /// The identifier that is authoritative after the update.
    pub fn identifier(&self) -> &RecordIdentifier {
        match self {
            IdentifierUpdate::Unchanged(identifier) => identifier,
            IdentifierUpdate::IdAssigned(identifier) => identifier,
            IdentifierUpdate::Merged { kept, .. } => kept,
        }
    }
}

/// Maps resource references to one stable identifier each.
///
/// Lookup precedence is `lid` first, then `(type, id)`. For any `(type, id)`
/// pair at most one identifier is registered.
pub struct IdentityCache {
    prefix: String,
    identifiers: HashMap<Lid, RecordIdentifier>,
    by_id: HashMap<String, HashMap<String, Lid>>,
    forwards: HashMap<Lid, Lid>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new("@lid")
    }
}

impl IdentityCache {
    pub fn new(prefix: impl Into<String>) -> Self {
        IdentityCache {
            prefix: prefix.into(),
            identifiers: HashMap::new(),
            by_id: HashMap::new(),
            forwards: HashMap::new(),
        }
    }

    fn generate_lid(&self, kind: &str) -> Lid {
        let n = NEXT_LID.fetch_add(1, Ordering::Relaxed);
        Lid::new(format!("{}:{}-{}", self.prefix, kind, n))
    }

    /// Follow forwarding entries left behind by merges.
    fn resolve_lid<'a>(&'a self, lid: &'a Lid) -> Option<&'a Lid> {
        let mut current = lid;
        loop {
            if self.identifiers.contains_key(current) {
                return Some(current);
            }
            current = self.forwards.get(current)?;
        }
    }

    /// The live identifier for `lid`, following merges.
    pub fn resolve(&self, lid: &Lid) -> Option<&RecordIdentifier> {
        self.resolve_lid(lid)
            .and_then(|lid| self.identifiers.get(lid))
    }

    pub fn peek_record_identifier(&self, key: &ResourceKey) -> Option<RecordIdentifier> {
        if let Some(lid) = &key.lid {
            if let Some(identifier) = self.resolve(lid) {
                return Some(identifier.clone());
            }
        }

        let kind = key.kind.as_deref()?;
        let id = key.id.as_deref()?;
        self.by_id
            .get(kind)
            .and_then(|ids| ids.get(id))
            .and_then(|lid| self.identifiers.get(lid))
            .cloned()
    }

    /// Returns the identifier for `key`, creating one if none is registered.
    ///
    /// # Panics
    ///
    /// When no identifier matches and `key` carries no type.
    pub fn get_or_create_record_identifier(&mut self, key: &ResourceKey) -> RecordIdentifier {
        if let Some(existing) = self.peek_record_identifier(key) {
            if existing.id().is_none() && key.id.is_some() {
                return self.update_record_identifier(&existing, key).identifier().clone();
            }
            return existing;
        }

        let kind = match key.kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind,
            _ => panic!("cannot create an identifier for {} without a type", key),
        };

        let lid = key.lid.clone().unwrap_or_else(|| self.generate_lid(kind));
        let identifier = RecordIdentifier::new(lid.clone(), kind, key.id.clone());
        if let Some(id) = &key.id {
            self.by_id
                .entry(kind.to_string())
                .or_default()
                .insert(id.clone(), lid.clone());
        }
        trace!(%identifier, "created identifier");
        self.identifiers.insert(lid, identifier.clone());
        identifier
    }

    /// Record what `data` says about `identifier`, merging when the incoming id
    /// is already registered to a different identifier.
    ///
    /// # Panics
    ///
    /// When `identifier` is unknown, or when it already has a different id.
    pub fn update_record_identifier(
        &mut self,
        identifier: &RecordIdentifier,
        data: &ResourceKey,
    ) -> IdentifierUpdate {
        let lid = match self.resolve_lid(identifier.lid()) {
            Some(lid) => lid.clone(),
            None => panic!("cannot update unknown identifier {}", identifier),
        };
        let current = self.identifiers[&lid].clone();

        let new_id = match &data.id {
            Some(id) => id.clone(),
            None => return IdentifierUpdate::Unchanged(current),
        };

        match current.id() {
            Some(existing) if existing == new_id => return IdentifierUpdate::Unchanged(current),
            Some(existing) => panic!(
                "cannot change the id of {} from '{}' to '{}'",
                current, existing, new_id
            ),
            None => {}
        }

        let kind = current.kind().to_string();
        let registered = self
            .by_id
            .get(&kind)
            .and_then(|ids| ids.get(&new_id))
            .cloned();

        let mut kept = current;
        kept.set_id(new_id.clone());
        self.identifiers.insert(lid.clone(), kept.clone());
        self.by_id
            .entry(kind)
            .or_default()
            .insert(new_id, lid.clone());

        match registered {
            Some(other) if other != lid => {
                let abandoned = self
                    .identifiers
                    .remove(&other)
                    .unwrap_or_else(|| RecordIdentifier::new(other.clone(), kept.kind(), kept.id.clone()));
                self.forwards.insert(other, lid);
                debug!(kept = %kept, abandoned = %abandoned.lid(), "merged identifiers");
                IdentifierUpdate::Merged { kept, abandoned }
            }
            _ => IdentifierUpdate::IdAssigned(kept),
        }
    }

    /// Drop an identifier entirely. Stale references no longer resolve.
    pub fn forget_record_identifier(&mut self, identifier: &RecordIdentifier) -> bool {
        let lid = match self.resolve_lid(identifier.lid()) {
            Some(lid) => lid.clone(),
            None => return false,
        };
        let Some(removed) = self.identifiers.remove(&lid) else {
            return false;
        };

        if let Some(id) = removed.id() {
            if let Some(ids) = self.by_id.get_mut(removed.kind()) {
                if ids.get(id) == Some(&lid) {
                    ids.remove(id);
                }
            }
        }
        self.forwards.retain(|from, to| *to != lid && *from != lid);
        trace!(identifier = %removed, "forgot identifier");
        true
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn clear(&mut self) {
        self.identifiers.clear();
        self.by_id.clear();
        self.forwards.clear();
    }
}

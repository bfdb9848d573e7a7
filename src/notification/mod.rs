//! Per-identifier change notifications.
//!
//! Subscribers register against one [`RecordIdentifier`] and are called
//! synchronously whenever the store reports a change for it. A subscriber
//! keeps receiving notifications after the identifier merges with another,
//! because subscriptions follow the surviving identifier.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::identifier::{Lid, RecordIdentifier};

/// What changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Attributes,
    Relationships,
    /// The identifier gained a server id or absorbed a duplicate.
    Identity,
    Errors,
    Meta,
    Unload,
    State,
}

impl NotificationKind {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationKind::Attributes => "attributes",
            NotificationKind::Relationships => "relationships",
            NotificationKind::Identity => "identity",
            NotificationKind::Errors => "errors",
            NotificationKind::Meta => "meta",
            NotificationKind::Unload => "unload",
            NotificationKind::State => "state",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`NotificationManager::subscribe`]; pass it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

type Callback = Box<dyn FnMut(&RecordIdentifier, NotificationKind, Option<&str>)>;

/// Registry of change callbacks keyed by identifier.
#[derive(Default)]
pub struct NotificationManager {
    callbacks: HashMap<Lid, Vec<(SubscriptionToken, Callback)>>,
    tokens: HashMap<SubscriptionToken, Lid>,
    next_token: u64,
}

impl NotificationManager {
    pub fn new() -> Self {
        NotificationManager::default()
    }

    pub fn subscribe(
        &mut self,
        identifier: &RecordIdentifier,
        callback: impl FnMut(&RecordIdentifier, NotificationKind, Option<&str>) + 'static,
    ) -> SubscriptionToken {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.callbacks
            .entry(identifier.lid().clone())
            .or_default()
            .push((token, Box::new(callback)));
        self.tokens.insert(token, identifier.lid().clone());
        token
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let Some(lid) = self.tokens.remove(&token) else {
            return false;
        };
        if let Some(callbacks) = self.callbacks.get_mut(&lid) {
            callbacks.retain(|(existing, _)| *existing != token);
            if callbacks.is_empty() {
                self.callbacks.remove(&lid);
            }
        }
        true
    }

    /// Call every subscriber of `identifier`. Returns whether anyone listened.
    pub fn notify(
        &mut self,
        identifier: &RecordIdentifier,
        kind: NotificationKind,
        key: Option<&str>,
    ) -> bool {
        let Some(callbacks) = self.callbacks.get_mut(identifier.lid()) else {
            return false;
        };
        trace!(%identifier, %kind, key, subscribers = callbacks.len(), "notify");
        for (_, callback) in callbacks.iter_mut() {
            callback(identifier, kind, key);
        }
        true
    }

    /// Move every subscription of `from` onto `to`.
    pub fn repoint(&mut self, from: &Lid, to: &Lid) {
        let Some(moved) = self.callbacks.remove(from) else {
            return;
        };
        for (token, _) in &moved {
            self.tokens.insert(*token, to.clone());
        }
        self.callbacks.entry(to.clone()).or_default().extend(moved);
    }

    /// Drop every subscription of `lid`.
    pub fn remove(&mut self, lid: &Lid) {
        if let Some(removed) = self.callbacks.remove(lid) {
            for (token, _) in removed {
                self.tokens.remove(&token);
            }
        }
    }

    pub fn subscriber_count(&self, lid: &Lid) -> usize {
        self.callbacks.get(lid).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
        self.tokens.clear();
    }
}

impl fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationManager")
            .field("subscriptions", &self.tokens.len())
            .finish()
    }
}

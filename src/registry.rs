//! Per-type adapter and serializer lookup.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::adapter::Adapter;
use crate::serializer::{JsonApiSerializer, Serializer};

/// Resolution order: the type's own entry, then the application default,
/// then (serializers only) the built-in [`JsonApiSerializer`].
pub struct Registry {
    adapters: HashMap<String, Rc<dyn Adapter>>,
    default_adapter: Option<Rc<dyn Adapter>>,
    serializers: HashMap<String, Rc<dyn Serializer>>,
    default_serializer: Option<Rc<dyn Serializer>>,
    builtin_serializer: Rc<dyn Serializer>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            adapters: HashMap::new(),
            default_adapter: None,
            serializers: HashMap::new(),
            default_serializer: None,
            builtin_serializer: Rc::new(JsonApiSerializer),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn set_default_adapter(&mut self, adapter: Rc<dyn Adapter>) {
        self.default_adapter = Some(adapter);
    }

    pub fn register_adapter(&mut self, kind: impl Into<String>, adapter: Rc<dyn Adapter>) {
        self.adapters.insert(kind.into(), adapter);
    }

    pub fn set_default_serializer(&mut self, serializer: Rc<dyn Serializer>) {
        self.default_serializer = Some(serializer);
    }

    pub fn register_serializer(&mut self, kind: impl Into<String>, serializer: Rc<dyn Serializer>) {
        self.serializers.insert(kind.into(), serializer);
    }

    pub fn has_adapter_for(&self, kind: &str) -> bool {
        self.adapters.contains_key(kind) || self.default_adapter.is_some()
    }

    /// # Panics
    ///
    /// When neither `kind` nor the application has an adapter.
    pub fn adapter_for(&self, kind: &str) -> Rc<dyn Adapter> {
        match self.adapters.get(kind).or(self.default_adapter.as_ref()) {
            Some(adapter) => Rc::clone(adapter),
            None => panic!("no adapter was found for '{}' and no application adapter was configured", kind),
        }
    }

    pub fn serializer_for(&self, kind: &str) -> Rc<dyn Serializer> {
        let serializer = self
            .serializers
            .get(kind)
            .or(self.default_serializer.as_ref())
            .unwrap_or(&self.builtin_serializer);
        Rc::clone(serializer)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adapters: Vec<&String> = self.adapters.keys().collect();
        adapters.sort();
        let mut serializers: Vec<&String> = self.serializers.keys().collect();
        serializers.sort();
        f.debug_struct("Registry")
            .field("adapters", &adapters)
            .field("default_adapter", &self.default_adapter.is_some())
            .field("serializers", &serializers)
            .field("default_serializer", &self.default_serializer.is_some())
            .finish()
    }
}

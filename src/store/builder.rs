use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::Store;
use crate::adapter::Adapter;
use crate::registry::Registry;
use crate::schema::{ModelSchema, Schema};
use crate::serializer::Serializer;

/// Store-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix of generated local identifiers.
    pub lid_prefix: String,
    /// How many diagnostics [`Store::diagnostics`] retains.
    pub diagnostics_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            lid_prefix: "@lid".to_string(),
            diagnostics_capacity: 100,
        }
    }
}

/// Assembles a [`Store`] from models, adapters and serializers.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    schema: Schema,
    registry: Registry,
}

impl StoreBuilder {
    pub fn new() -> Self {
        StoreBuilder::default()
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a record type.
    pub fn with_model(mut self, kind: impl Into<String>, model: ModelSchema) -> Self {
        self.schema.register(kind, model);
        self
    }

    /// The application adapter, used for every type without its own.
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.registry.set_default_adapter(Rc::new(adapter));
        self
    }

    pub fn with_adapter_for(mut self, kind: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        self.registry.register_adapter(kind, Rc::new(adapter));
        self
    }

    /// Share an adapter the caller keeps a handle to.
    pub fn with_shared_adapter(mut self, adapter: Rc<dyn Adapter>) -> Self {
        self.registry.set_default_adapter(adapter);
        self
    }

    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.registry.set_default_serializer(Rc::new(serializer));
        self
    }

    pub fn with_serializer_for(mut self, kind: impl Into<String>, serializer: impl Serializer + 'static) -> Self {
        self.registry.register_serializer(kind, Rc::new(serializer));
        self
    }

    pub fn build(self) -> Store {
        Store::from_parts(self.config, self.schema, self.registry)
    }
}

use serde_json::{Map, Value};

/// Options for [`Store::find_record`](crate::Store::find_record).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    /// Always ask the adapter, even when the record is cached.
    pub reload: bool,
    /// Overrides the adapter's background reload decision.
    pub background_reload: Option<bool>,
    pub include: Option<String>,
    pub adapter_options: Option<Value>,
    /// Data applied to the record before it is fetched.
    pub preload: Option<Map<String, Value>>,
}

impl FindOptions {
    pub fn new() -> Self {
        FindOptions::default()
    }

    pub fn reload(mut self) -> Self {
        self.reload = true;
        self
    }

    pub fn background_reload(mut self, background_reload: bool) -> Self {
        self.background_reload = Some(background_reload);
        self
    }

    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn adapter_options(mut self, options: Value) -> Self {
        self.adapter_options = Some(options);
        self
    }

    pub fn preload(mut self, preload: Map<String, Value>) -> Self {
        self.preload = Some(preload);
        self
    }
}

/// Options for [`Store::find_all`](crate::Store::find_all).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindAllOptions {
    pub reload: bool,
    pub background_reload: Option<bool>,
    pub include: Option<String>,
    pub adapter_options: Option<Value>,
}

impl FindAllOptions {
    pub fn new() -> Self {
        FindAllOptions::default()
    }

    pub fn reload(mut self) -> Self {
        self.reload = true;
        self
    }

    pub fn background_reload(mut self, background_reload: bool) -> Self {
        self.background_reload = Some(background_reload);
        self
    }

    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn adapter_options(mut self, options: Value) -> Self {
        self.adapter_options = Some(options);
        self
    }
}

/// Options passed through to adapter queries and saves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    pub adapter_options: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        RequestOptions::default()
    }

    pub fn adapter_options(mut self, options: Value) -> Self {
        self.adapter_options = Some(options);
        self
    }
}

/// What a snapshot carries besides record data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotOptions {
    pub include: Option<String>,
    pub adapter_options: Option<Value>,
}

impl From<&FindOptions> for SnapshotOptions {
    fn from(options: &FindOptions) -> Self {
        SnapshotOptions {
            include: options.include.clone(),
            adapter_options: options.adapter_options.clone(),
        }
    }
}

impl From<&FindAllOptions> for SnapshotOptions {
    fn from(options: &FindAllOptions) -> Self {
        SnapshotOptions {
            include: options.include.clone(),
            adapter_options: options.adapter_options.clone(),
        }
    }
}

impl From<&RequestOptions> for SnapshotOptions {
    fn from(options: &RequestOptions) -> Self {
        SnapshotOptions {
            include: None,
            adapter_options: options.adapter_options.clone(),
        }
    }
}

use crate::config::SessionConfig;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::schema::Schema;
use crate::store::DocumentStore;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Store handle, identifier source and configuration shared by every
/// persistence call. Cloning is cheap.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn DocumentStore>,
    ids: Arc<dyn IdGenerator>,
    config: SessionConfig,
}

impl Session {
    pub fn new<S>(store: S) -> Self
    where
        S: DocumentStore + 'static,
    {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            ids: Arc::new(UuidGenerator),
            config: SessionConfig::default(),
        }
    }

    pub fn with_id_generator<G>(mut self, ids: G) -> Self
    where
        G: IdGenerator + 'static,
    {
        self.ids = Arc::new(ids);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn collection_name(&self, schema: &Schema) -> String {
        self.config.collection_name(schema.collection())
    }

    pub(crate) fn generate_id(&self) -> Value {
        self.ids.generate()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

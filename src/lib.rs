// ============================================================================
// Consys Library
// ============================================================================

pub mod core;
pub mod attribute;
pub mod schema;
pub mod state;
pub mod query;
pub mod store;
pub mod ids;
pub mod config;
pub mod persist;
pub mod handlers;
pub mod prelude;

// Re-export main types for convenience
pub use crate::core::{ConsysError, Document, Result, ValueKind};
pub use attribute::Attribute;
pub use schema::{SYSTEM_FIELDS, Schema};
pub use state::InstanceView;
pub use query::{Ids, Query};
pub use store::{DocumentStore, MemoryStore, Projection};
pub use ids::{IdGenerator, SequenceGenerator, UuidGenerator};
pub use config::SessionConfig;
pub use persist::{Fetched, Instance, Lifecycle, Model, Session};

// Used by `model!` expansions
#[doc(hidden)]
pub use lazy_static;
#[doc(hidden)]
pub use paste;
#[doc(hidden)]
pub use serde_json;

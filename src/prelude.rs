//! Everything needed to declare models and work with them.
//!
//! ```ignore
//! use consys::prelude::*;
//! ```

pub use crate::{
    Attribute, ConsysError, Document, Fetched, Ids, Instance, InstanceView, Lifecycle,
    MemoryStore, Model, Query, Result, Session, SessionConfig, ValueKind, model,
};
pub use serde_json::{Value, json};

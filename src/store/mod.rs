pub mod filter;
pub mod memory;

pub use filter::matches;
pub use memory::MemoryStore;

use crate::core::{Document, Result, get_path, remove_path, set_path};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

/// Which fields a read returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Dotted names select or drop nested values.
    pub fn apply(&self, document: &Document) -> Document {
        match self {
            Projection::All => document.clone(),
            Projection::Include(fields) => {
                let mut projected = Document::new();
                for field in fields {
                    if let Some(value) = get_path(document, field) {
                        set_path(&mut projected, field, value.clone());
                    }
                }
                projected
            }
            Projection::Exclude(fields) => {
                let mut projected = document.clone();
                for field in fields {
                    remove_path(&mut projected, field);
                }
                projected
            }
        }
    }
}

/// Document store the persistence engine talks to.
///
/// Implementations must make each call atomic for a single document; the
/// engine adds no locking of its own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Projection,
    ) -> Result<Option<Document>>;

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Projection,
    ) -> Result<Vec<Document>>;

    /// Replaces the first document matching `filter`, inserting when none
    /// does. Returns the stored document's `id`.
    async fn upsert(&self, collection: &str, filter: &Document, document: Document)
    -> Result<Value>;

    /// Applies `set` and `unset` (dotted paths allowed) to every matching
    /// document. Returns the number of documents matched.
    async fn update(
        &self,
        collection: &str,
        filter: &Document,
        set: &Document,
        unset: &[String],
    ) -> Result<u64>;

    async fn delete(&self, collection: &str, filter: &Document) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn include_projection_keeps_nested_paths() {
        let source = document(json!({"id": 1, "meta": "onigiri", "sodzu": {"sake": [1], "umi": 2}}));
        let projected = Projection::include(["id", "sodzu.sake"]).apply(&source);
        assert_eq!(projected, document(json!({"id": 1, "sodzu": {"sake": [1]}})));
    }

    #[test]
    fn exclude_projection_drops_fields() {
        let source = document(json!({"id": 1, "meta": "onigiri"}));
        let projected = Projection::exclude(["meta"]).apply(&source);
        assert_eq!(projected, document(json!({"id": 1})));
    }
}

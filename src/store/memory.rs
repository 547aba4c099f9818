use super::{DocumentStore, Projection, matches};
use crate::core::{Document, Result, remove_path, set_path};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process document store.
///
/// Collections are created on first write. Every call takes the store-wide
/// lock once, which makes each operation atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map(Vec::len).unwrap_or(0)
    }

    pub async fn list_collections(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        collections.keys().cloned().collect()
    }

    pub async fn drop_collection(&self, collection: &str) -> bool {
        let mut collections = self.collections.write().await;
        collections.remove(collection).is_some()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Projection,
    ) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(None);
        };

        for document in documents {
            if matches(document, filter)? {
                return Ok(Some(projection.apply(document)));
            }
        }
        Ok(None)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: &Projection,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for document in documents {
            if matches(document, filter)? {
                found.push(projection.apply(document));
            }
        }
        Ok(found)
    }

    async fn upsert(
        &self,
        collection: &str,
        filter: &Document,
        document: Document,
    ) -> Result<Value> {
        let id = document.get("id").cloned().unwrap_or(Value::Null);
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        let mut position = None;
        for (idx, existing) in documents.iter().enumerate() {
            if matches(existing, filter)? {
                position = Some(idx);
                break;
            }
        }

        match position {
            Some(idx) => documents[idx] = document,
            None => documents.push(document),
        }
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Document,
        set: &Document,
        unset: &[String],
    ) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut affected = 0;
        for document in documents.iter_mut() {
            if !matches(document, filter)? {
                continue;
            }
            for (path, value) in set {
                set_path(document, path, value.clone());
            }
            for path in unset {
                remove_path(document, path);
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, collection: &str, filter: &Document) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut keep = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            keep.push(!matches(document, filter)?);
        }

        let before = documents.len();
        let mut flags = keep.into_iter();
        documents.retain(|_| flags.next().unwrap_or(true));
        Ok((before - documents.len()) as u64)
    }
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

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let store = MemoryStore::new();
        let filter = document(json!({"id": 1}));

        store
            .upsert("notes", &filter, document(json!({"id": 1, "meta": "a"})))
            .await
            .unwrap();
        store
            .upsert("notes", &filter, document(json!({"id": 1, "meta": "b"})))
            .await
            .unwrap();

        assert_eq!(store.count("notes").await, 1);
        let found = store
            .find_one("notes", &filter, &Projection::All)
            .await
            .unwrap();
        assert_eq!(found, Some(document(json!({"id": 1, "meta": "b"}))));
    }

    #[tokio::test]
    async fn update_sets_and_unsets_fields() {
        let store = MemoryStore::new();
        let filter = document(json!({"id": 1}));
        store
            .upsert("notes", &filter, document(json!({"id": 1, "meta": "a", "delta": "d"})))
            .await
            .unwrap();

        let affected = store
            .update(
                "notes",
                &filter,
                &document(json!({"meta": "b", "sodzu.sake": 1})),
                &["delta".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let found = store
            .find_one("notes", &filter, &Projection::All)
            .await
            .unwrap();
        assert_eq!(
            found,
            Some(document(json!({"id": 1, "meta": "b", "sodzu": {"sake": 1}})))
        );
    }

    #[tokio::test]
    async fn update_and_delete_report_zero_for_missing_documents() {
        let store = MemoryStore::new();
        let filter = document(json!({"id": 404}));

        assert_eq!(
            store.update("notes", &filter, &Document::new(), &[]).await.unwrap(),
            0
        );
        assert_eq!(store.delete("notes", &filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_only_matching_documents() {
        let store = MemoryStore::new();
        for id in 1..=3 {
            let filter = document(json!({"id": id}));
            store
                .upsert("notes", &filter, document(json!({"id": id})))
                .await
                .unwrap();
        }

        let removed = store
            .delete("notes", &document(json!({"id": {"$in": [1, 3]}})))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let left = store
            .find("notes", &Document::new(), &Projection::All)
            .await
            .unwrap();
        assert_eq!(left, vec![document(json!({"id": 2}))]);
    }

    #[tokio::test]
    async fn collections_appear_on_first_write() {
        let store = MemoryStore::new();
        assert!(store.list_collections().await.is_empty());

        let filter = document(json!({"id": 1}));
        store
            .upsert("app.notes", &filter, document(json!({"id": 1})))
            .await
            .unwrap();
        assert_eq!(store.list_collections().await, vec!["app.notes".to_string()]);

        assert!(store.drop_collection("app.notes").await);
        assert!(!store.drop_collection("app.notes").await);
        assert_eq!(store.count("app.notes").await, 0);
    }
}

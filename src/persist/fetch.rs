//! Class-level reads: `get` and `complex`.

use super::{Fetched, Instance, Session};
use crate::core::{ConsysError, Document, Result, compare_values};
use crate::query::{Ids, Query, QueryTranslator};
use crate::schema::{SYSTEM_FIELDS, Schema};
use crate::store::Projection;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{Instrument, Level, event, info_span};

impl Session {
    pub(crate) async fn fetch(
        &self,
        schema: &'static Schema,
        query: &Query,
    ) -> Result<Fetched<Instance>> {
        let request = QueryTranslator::new(schema, self.config()).translate(query)?;
        let collection = self.collection_name(schema);
        let span = info_span!("consys.get", collection = %collection);

        let hydrate = |document: Document| match request.projection {
            Projection::All => Instance::from_document(schema, document),
            _ => Instance::from_projection(schema, document),
        };

        async {
            if let Some(id) = &request.single {
                let document = self
                    .store()
                    .find_one(&collection, &request.filter, &request.projection)
                    .await?;
                return match document {
                    Some(document) => Ok(Fetched::One(hydrate(document))),
                    None => Err(ConsysError::not_found(collection.as_str(), id.clone())),
                };
            }

            let mut documents = self
                .store()
                .find(&collection, &request.filter, &request.projection)
                .await?;
            sort_by_id_descending(&mut documents);
            event!(Level::DEBUG, count = documents.len(), "documents fetched");

            Ok(Fetched::Many(documents.into_iter().map(&hydrate).collect()))
        }
        .instrument(span)
        .await
    }

    /// Reads one whole document by id.
    pub(crate) async fn fetch_by_id(&self, schema: &'static Schema, id: Value) -> Result<Instance> {
        let request = QueryTranslator::new(schema, self.config())
            .translate(&Query::by_ids(Ids::One(id.clone())))?;
        let collection = self.collection_name(schema);
        let span = info_span!("consys.get", collection = %collection, id = %id);

        async {
            self.store()
                .find_one(&collection, &request.filter, &Projection::All)
                .await?
                .map(|document| Instance::from_document(schema, document))
                .ok_or_else(|| ConsysError::not_found(collection.as_str(), id))
        }
        .instrument(span)
        .await
    }

    /// Reads documents projected to `fields`, resolves those fields
    /// (defaults included, nulls skipped) and maps each through `handler`.
    pub(crate) async fn fetch_complex<F>(
        &self,
        schema: &'static Schema,
        ids: Ids,
        fields: BTreeSet<String>,
        handler: F,
    ) -> Result<Fetched<Document>>
    where
        F: Fn(Document) -> Document + Send + Sync,
    {
        if let Some(unknown) = fields.iter().find(|field| !schema.contains_path(field)) {
            return Err(ConsysError::UnknownField(unknown.clone()));
        }

        let translator = QueryTranslator::new(schema, self.config());
        let request = translator.translate(&Query::by_ids(ids))?;
        // computed defaults may read any field
        let computed = fields.iter().any(|field| {
            let root = field.split('.').next().unwrap_or(field);
            schema
                .attribute(root)
                .is_some_and(|attribute| attribute.literal_default().is_none())
        });
        let projection = if computed {
            Projection::All
        } else {
            let mut projection = translator.exact_projection(&fields);
            // kept for ordering, dropped from the resolved mapping
            if let Projection::Include(included) = &mut projection {
                included.insert("id".to_string());
            }
            projection
        };

        let requested: Vec<String> = if fields.is_empty() {
            SYSTEM_FIELDS.iter().map(|field| field.to_string()).collect()
        } else {
            fields.into_iter().collect()
        };
        let resolve = |document: Document| -> Result<Document> {
            let instance = Instance::from_projection(schema, document);
            let mut resolved = Document::new();
            for field in &requested {
                let value = instance.get(field)?;
                if !value.is_null() {
                    resolved.insert(field.clone(), value);
                }
            }
            Ok(handler(resolved))
        };

        let collection = self.collection_name(schema);
        let span = info_span!("consys.complex", collection = %collection);
        async {
            if let Some(id) = &request.single {
                let document = self
                    .store()
                    .find_one(&collection, &request.filter, &projection)
                    .await?;
                return match document {
                    Some(document) => Ok(Fetched::One(resolve(document)?)),
                    None => Err(ConsysError::not_found(collection.as_str(), id.clone())),
                };
            }

            let mut documents = self
                .store()
                .find(&collection, &request.filter, &projection)
                .await?;
            sort_by_id_descending(&mut documents);
            let results = documents
                .into_iter()
                .map(&resolve)
                .collect::<Result<Vec<_>>>()?;
            Ok(Fetched::Many(results))
        }
        .instrument(span)
        .await
    }
}

fn sort_by_id_descending(documents: &mut [Document]) {
    documents.sort_by(|left, right| {
        compare_values(
            right.get("id").unwrap_or(&Value::Null),
            left.get("id").unwrap_or(&Value::Null),
        )
    });
}

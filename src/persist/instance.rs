use super::Session;
use crate::core::{ConsysError, Document, Result, get_path, remove_path, set_path, values_equal};
use crate::schema::Schema;
use crate::state::{Diff, InstanceState, InstanceView};
use crate::store::Projection;
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::{Instrument, Level, event, info_span};

/// Where an instance stands relative to its backing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Never saved or loaded.
    Unbound,
    Clean,
    /// Bound, with assignments not yet saved.
    Dirty,
    /// Backing document deleted; terminal.
    Removed,
}

/// One model object: schema-described fields over an [`InstanceState`].
#[derive(Debug, Clone)]
pub struct Instance {
    schema: &'static Schema,
    state: InstanceState,
    removed: bool,
}

impl Instance {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            state: InstanceState::new(),
            removed: false,
        }
    }

    /// Builds an unbound instance, validating every given field.
    /// `id` is applied first so checkers see it.
    pub fn with_fields<I, K, V>(schema: &'static Schema, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut fields: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_string(), value.into()))
            .collect();
        fields.sort_by_key(|(name, _)| name != "id");

        let mut instance = Self::new(schema);
        for (name, value) in fields {
            instance.set(&name, value)?;
        }
        Ok(instance)
    }

    /// Instance backed by a document read from the store.
    pub(crate) fn from_document(schema: &'static Schema, document: Document) -> Self {
        Self {
            schema,
            state: InstanceState::from_loaded(document),
            removed: false,
        }
    }

    /// Instance backed by a projected document; fields outside the
    /// projection may still exist in storage.
    pub(crate) fn from_projection(schema: &'static Schema, document: Document) -> Self {
        Self {
            schema,
            state: InstanceState::from_projected(document),
            removed: false,
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Current value of a field or of a dotted path inside a mapping field.
    pub fn get(&self, name: &str) -> Result<Value> {
        let (root, rest) = self.split_field(name)?;
        let value = self.state.resolve(self.schema, root);
        match rest {
            None => Ok(value),
            Some(path) => Ok(match value {
                Value::Object(map) => get_path(&map, path).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            }),
        }
    }

    pub fn id(&self) -> Value {
        self.state.resolve(self.schema, "id")
    }

    /// Validates and assigns a value. `null` leaves the field untouched;
    /// use [`Instance::unset`] to clear it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (root, rest) = self.split_field(name)?;
        if value.is_null() {
            return Ok(());
        }
        if root == "id" && !self.state.is_new() {
            if values_equal(&value, &self.bound_id()) {
                return Ok(());
            }
            return Err(self.bound_id_error());
        }

        let value = match rest {
            None => value,
            Some(path) => {
                let mut mapping = self.mapping_of(root);
                set_path(&mut mapping, path, value);
                Value::Object(mapping)
            }
        };

        let Some(attribute) = self.schema.attribute(root) else {
            return Err(ConsysError::UnknownField(root.to_string()));
        };
        let prepared = attribute.prepare(&self.id(), value)?;
        self.state.assign(root, prepared);
        Ok(())
    }

    /// Reverts a field to its default; the next save removes it from storage.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let (root, rest) = self.split_field(name)?;
        if root == "id" && !self.state.is_new() {
            return Err(self.bound_id_error());
        }
        match rest {
            None => self.state.unassign(root),
            Some(path) => {
                let mut mapping = self.mapping_of(root);
                if remove_path(&mut mapping, path) {
                    self.state.assign(root, Value::Object(mapping));
                }
            }
        }
        Ok(())
    }

    /// Fields assigned or deleted since construction or the last sync.
    pub fn specified_fields(&self) -> Option<BTreeSet<String>> {
        self.state
            .specified_fields()
            .map(|fields| fields.into_iter().map(str::to_string).collect())
    }

    /// Values as last read from or written to the store.
    pub fn loaded_values(&self) -> Option<&Document> {
        self.state.loaded()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.removed {
            Lifecycle::Removed
        } else if self.state.is_new() {
            Lifecycle::Unbound
        } else if self.state.is_dirty() {
            Lifecycle::Dirty
        } else {
            Lifecycle::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    pub fn view(&self) -> InstanceView<'_> {
        self.state.view(self.schema)
    }

    /// Every field with a non-null current value, defaults included.
    pub fn to_document(&self) -> Document {
        self.state.current(self.schema)
    }

    /// Writes the instance: a full upsert when unbound, otherwise only
    /// the fields that changed since the last sync.
    pub async fn save(&mut self, session: &Session) -> Result<()> {
        if self.removed {
            return Err(ConsysError::State(
                "cannot save a removed document".to_string(),
            ));
        }

        let collection = session.collection_name(self.schema);
        let span = info_span!("consys.save", collection = %collection, id = %self.id());
        async {
            if self.state.is_new() {
                self.insert(session, &collection).await
            } else {
                self.update(session, &collection).await
            }
        }
        .instrument(span)
        .await
    }

    async fn insert(&mut self, session: &Session, collection: &str) -> Result<()> {
        let schema = self.schema;
        let mut state = self.state.clone();

        let mut id = state.resolve(schema, "id");
        if id.is_null() {
            if schema.declares_id() {
                return Err(ConsysError::validation("id", Value::Null));
            }
            id = session.generate_id();
            state.assign("id", id.clone());
        }

        let now = timestamp();
        if state.resolve(schema, "created").is_null() {
            state.assign("created", now.clone());
        }
        state.assign("updated", now);

        let diff = state.diff(schema);
        check_unique(session, schema, collection, &id, &diff).await?;

        let filter = id_filter(&id);
        session
            .store()
            .upsert(collection, &filter, diff.persisted.clone())
            .await
            .inspect_err(|err| event!(Level::ERROR, error = %err, "document insert failed"))?;

        state.mark_synced(diff.persisted);
        self.state = state;
        event!(Level::DEBUG, id = %id, "document inserted");
        Ok(())
    }

    async fn update(&mut self, session: &Session, collection: &str) -> Result<()> {
        let schema = self.schema;
        if self.state.diff(schema).is_empty() {
            self.state.clear_specified();
            event!(Level::DEBUG, "nothing to save");
            return Ok(());
        }

        let mut state = self.state.clone();
        state.assign("updated", timestamp());
        let diff = state.diff(schema);

        let id = self.bound_id();
        check_unique(session, schema, collection, &state.resolve(schema, "id"), &diff).await?;

        let affected = session
            .store()
            .update(collection, &id_filter(&id), &diff.set, &diff.unset)
            .await
            .inspect_err(|err| event!(Level::ERROR, error = %err, "document update failed"))?;
        if affected == 0 {
            return Err(ConsysError::not_found(collection, id));
        }

        state.mark_synced(diff.persisted);
        self.state = state;
        event!(
            Level::DEBUG,
            set = diff.set.len(),
            unset = diff.unset.len(),
            "document updated"
        );
        Ok(())
    }

    /// Re-reads the backing document, discarding unsaved assignments.
    pub async fn reload(&mut self, session: &Session) -> Result<()> {
        self.ensure_bound("reload")?;

        let collection = session.collection_name(self.schema);
        let id = self.bound_id();
        let span = info_span!("consys.reload", collection = %collection, id = %id);
        async {
            let document = session
                .store()
                .find_one(&collection, &id_filter(&id), &Projection::All)
                .await?;
            match document {
                Some(document) => {
                    self.state.hydrate(document);
                    event!(Level::DEBUG, "document reloaded");
                    Ok(())
                }
                None => Err(ConsysError::not_found(collection.as_str(), id.clone())),
            }
        }
        .instrument(span)
        .await
    }

    /// Deletes the backing document. The instance cannot be used for
    /// storage afterwards.
    pub async fn rm(&mut self, session: &Session) -> Result<()> {
        self.ensure_bound("remove")?;

        let collection = session.collection_name(self.schema);
        let id = self.bound_id();
        let span = info_span!("consys.rm", collection = %collection, id = %id);
        async {
            let deleted = session.store().delete(&collection, &id_filter(&id)).await?;
            if deleted == 0 {
                return Err(ConsysError::not_found(collection.as_str(), id.clone()));
            }
            self.removed = true;
            event!(Level::DEBUG, "document removed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn ensure_bound(&self, action: &str) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Unbound => Err(ConsysError::State(format!(
                "cannot {} a document that was never saved",
                action
            ))),
            Lifecycle::Removed => Err(ConsysError::State(format!(
                "cannot {} a removed document",
                action
            ))),
            Lifecycle::Clean | Lifecycle::Dirty => Ok(()),
        }
    }

    /// Identifier the backing document is stored under.
    fn bound_id(&self) -> Value {
        self.state
            .loaded()
            .and_then(|loaded| loaded.get("id"))
            .cloned()
            .unwrap_or_else(|| self.id())
    }

    fn bound_id_error(&self) -> ConsysError {
        ConsysError::State(format!(
            "id of a stored document is fixed at {}",
            self.bound_id()
        ))
    }

    fn split_field<'n>(&self, name: &'n str) -> Result<(&'n str, Option<&'n str>)> {
        let (root, rest) = match name.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (name, None),
        };
        if !self.schema.contains(root) {
            return Err(ConsysError::UnknownField(name.to_string()));
        }
        Ok((root, rest))
    }

    fn mapping_of(&self, field: &str) -> Document {
        match self.state.resolve(self.schema, field) {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}

impl Serialize for Instance {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_document().serialize(serializer)
    }
}

/// Rejects a write that would give a `unique` field a value another
/// document already holds.
async fn check_unique(
    session: &Session,
    schema: &Schema,
    collection: &str,
    id: &Value,
    diff: &Diff,
) -> Result<()> {
    if !session.config().check_unique {
        return Ok(());
    }

    for (field, value) in &diff.set {
        let unique = schema
            .attribute(field)
            .is_some_and(|attribute| attribute.is_unique());
        if !unique {
            continue;
        }

        let mut filter = Document::new();
        filter.insert(field.clone(), value.clone());
        filter.insert("id".to_string(), json!({ "$ne": id }));
        let taken = session
            .store()
            .find_one(collection, &filter, &Projection::include(["id"]))
            .await?;
        if taken.is_some() {
            event!(Level::WARN, field = %field, "unique value already taken");
            return Err(ConsysError::Duplicate {
                field: field.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

fn id_filter(id: &Value) -> Document {
    let mut filter = Document::new();
    filter.insert("id".to_string(), id.clone());
    filter
}

/// Seconds since the epoch, with microsecond precision.
fn timestamp() -> Value {
    Value::from(Utc::now().timestamp_micros() as f64 / 1_000_000.0)
}

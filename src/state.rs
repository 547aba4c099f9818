//! Per-instance bookkeeping: loaded values, explicit assignments and the
//! diff that brings storage in line with them.

use crate::core::{Document, values_equal};
use crate::schema::Schema;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Level, event};

/// Nesting limit for computed defaults reading other computed defaults.
const MAX_DEFAULT_DEPTH: usize = 16;

/// Final per-field outcome of the assignments since the last sync.
#[derive(Debug, Clone, PartialEq)]
pub enum Assigned {
    Value(Value),
    /// Deleted: resolves to the declared default and is unset on save.
    Unset,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceState {
    loaded: Option<Document>,
    assigned: BTreeMap<String, Assigned>,
    /// Loaded values came through a projection, so a field missing from
    /// them may still be stored.
    partial: bool,
}

/// Minimal write that brings storage from the loaded values to the current ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    pub set: Document,
    pub unset: Vec<String>,
    /// Sparse document of every non-default current value: what storage
    /// holds once the write succeeds.
    pub persisted: Document,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

impl InstanceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_loaded(document: Document) -> Self {
        Self {
            loaded: Some(document),
            assigned: BTreeMap::new(),
            partial: false,
        }
    }

    /// Loaded values holding only some of the stored fields.
    pub fn from_projected(document: Document) -> Self {
        Self {
            partial: true,
            ..Self::from_loaded(document)
        }
    }

    pub fn loaded(&self) -> Option<&Document> {
        self.loaded.as_ref()
    }

    pub fn is_new(&self) -> bool {
        self.loaded.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        !self.assigned.is_empty()
    }

    /// Fields touched since construction or the last load/save; `None` when clean.
    pub fn specified_fields(&self) -> Option<BTreeSet<&str>> {
        if self.assigned.is_empty() {
            return None;
        }
        Some(self.assigned.keys().map(String::as_str).collect())
    }

    pub fn assigned(&self, name: &str) -> Option<&Assigned> {
        self.assigned.get(name)
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        self.assigned.insert(name.to_string(), Assigned::Value(value));
    }

    pub fn unassign(&mut self, name: &str) {
        self.assigned.insert(name.to_string(), Assigned::Unset);
    }

    /// Replaces loaded values with a full stored document and forgets
    /// assignments.
    pub fn hydrate(&mut self, document: Document) {
        self.loaded = Some(document);
        self.assigned.clear();
        self.partial = false;
    }

    /// Records a successful write. Fields outside a projection stay
    /// unknown, so a partial state remains partial.
    pub fn mark_synced(&mut self, persisted: Document) {
        self.loaded = Some(persisted);
        self.assigned.clear();
    }

    pub fn clear_specified(&mut self) {
        self.assigned.clear();
    }

    pub fn view<'a>(&'a self, schema: &'a Schema) -> InstanceView<'a> {
        InstanceView {
            schema,
            state: self,
            depth: 0,
        }
    }

    /// Current value of a field: explicit > loaded > default.
    pub fn resolve(&self, schema: &Schema, name: &str) -> Value {
        self.resolve_at(schema, name, 0)
    }

    pub fn default_of(&self, schema: &Schema, name: &str) -> Value {
        self.default_at(schema, name, 0)
    }

    fn resolve_at(&self, schema: &Schema, name: &str, depth: usize) -> Value {
        match self.assigned.get(name) {
            Some(Assigned::Value(value)) => return value.clone(),
            Some(Assigned::Unset) => return self.default_at(schema, name, depth),
            None => {}
        }

        match self.loaded.as_ref().and_then(|loaded| loaded.get(name)) {
            Some(value) if !value.is_null() => value.clone(),
            _ => self.default_at(schema, name, depth),
        }
    }

    fn default_at(&self, schema: &Schema, name: &str, depth: usize) -> Value {
        let Some(attribute) = schema.attribute(name) else {
            return Value::Null;
        };
        if depth >= MAX_DEFAULT_DEPTH {
            event!(
                Level::WARN,
                collection = schema.collection(),
                field = name,
                "computed defaults nest too deep, falling back to null"
            );
            return Value::Null;
        }

        let view = InstanceView {
            schema,
            state: self,
            depth: depth + 1,
        };
        attribute.resolve_default(&view)
    }

    /// Every declared field with a non-null current value.
    pub fn current(&self, schema: &Schema) -> Document {
        let mut document = Document::new();
        for name in schema.names() {
            let value = self.resolve(schema, name);
            if !value.is_null() {
                document.insert(name.to_string(), value);
            }
        }
        document
    }

    pub fn diff(&self, schema: &Schema) -> Diff {
        let mut diff = Diff::default();
        let is_new = self.loaded.is_none();

        for name in schema.names() {
            let current = self.resolve(schema, name);
            let default = self.default_of(schema, name);
            let loaded = self.loaded.as_ref().and_then(|loaded| loaded.get(name));

            if current.is_null() || values_equal(&current, &default) {
                let maybe_stored =
                    loaded.is_some() || (self.partial && self.assigned.contains_key(name));
                if !is_new && maybe_stored {
                    diff.unset.push(name.to_string());
                }
                continue;
            }

            let changed = match loaded {
                Some(previous) => !values_equal(previous, &current),
                None => true,
            };
            if is_new || changed {
                diff.set.insert(name.to_string(), current.clone());
            }
            diff.persisted.insert(name.to_string(), current);
        }

        diff
    }
}

/// Read-only view of an instance handed to computed defaults.
pub struct InstanceView<'a> {
    schema: &'a Schema,
    state: &'a InstanceState,
    depth: usize,
}

impl<'a> InstanceView<'a> {
    pub fn get(&self, name: &str) -> Value {
        self.state.resolve_at(self.schema, name, self.depth)
    }

    pub fn id(&self) -> Value {
        self.get("id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::core::ValueKind;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::builder("tests")
            .field("meta", Attribute::of(ValueKind::String))
            .field("delta", Attribute::of(ValueKind::String).default(""))
            .field(
                "extra",
                Attribute::of(ValueKind::String).default_with(|instance| {
                    json!(format!("u{}o", instance.get("delta").as_str().unwrap_or_default()))
                }),
            )
            .field("multi", Attribute::of(ValueKind::Sequence).default(json!([])))
            .build()
    }

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn precedence_is_explicit_then_loaded_then_default() {
        let schema = schema();
        let mut state = InstanceState::from_loaded(document(json!({"id": 1, "delta": "hinkali"})));

        assert_eq!(state.resolve(&schema, "delta"), json!("hinkali"));
        assert_eq!(state.resolve(&schema, "multi"), json!([]));

        state.assign("delta", json!("hacapuri"));
        assert_eq!(state.resolve(&schema, "delta"), json!("hacapuri"));

        state.unassign("delta");
        assert_eq!(state.resolve(&schema, "delta"), json!(""));
    }

    #[test]
    fn computed_default_follows_dependencies() {
        let schema = schema();
        let mut state = InstanceState::new();
        assert_eq!(state.resolve(&schema, "extra"), json!("uo"));

        state.assign("delta", json!("x"));
        assert_eq!(state.resolve(&schema, "extra"), json!("uxo"));
    }

    #[test]
    fn new_instance_diff_sets_every_non_default_field() {
        let schema = schema();
        let mut state = InstanceState::new();
        state.assign("id", json!(5));
        state.assign("meta", json!("onigiri"));
        state.assign("delta", json!(""));

        let diff = state.diff(&schema);
        assert_eq!(diff.set, document(json!({"id": 5, "meta": "onigiri"})));
        assert!(diff.unset.is_empty());
        assert_eq!(diff.persisted, diff.set);
    }

    #[test]
    fn reverting_to_default_unsets_loaded_field() {
        let schema = schema();
        let mut state = InstanceState::from_loaded(document(
            json!({"id": 1, "delta": "hinkali", "multi": [1, 2, 3]}),
        ));
        state.assign("delta", json!(""));

        let diff = state.diff(&schema);
        assert!(diff.set.is_empty());
        assert_eq!(diff.unset, vec!["delta".to_string()]);
        assert_eq!(diff.persisted, document(json!({"id": 1, "multi": [1, 2, 3]})));
    }

    #[test]
    fn unchanged_loaded_values_produce_empty_diff() {
        let schema = schema();
        let mut state = InstanceState::from_loaded(document(json!({"id": 1, "meta": "onigiri"})));
        state.assign("meta", json!("onigiri"));

        assert!(state.diff(&schema).is_empty());
    }

    #[test]
    fn assigning_default_to_absent_field_is_not_a_change() {
        let schema = schema();
        let mut state = InstanceState::from_loaded(document(json!({"id": 1, "meta": "onigiri"})));
        state.assign("delta", json!(""));
        state.unassign("multi");

        assert!(state.diff(&schema).is_empty());
    }

    #[test]
    fn projected_state_unsets_fields_it_did_not_load() {
        let schema = schema();
        let mut state = InstanceState::from_projected(document(json!({"id": 1})));
        state.unassign("meta");

        let diff = state.diff(&schema);
        assert_eq!(diff.unset, vec!["meta".to_string()]);

        state.mark_synced(diff.persisted);
        state.unassign("delta");
        assert_eq!(state.diff(&schema).unset, vec!["delta".to_string()]);

        state.hydrate(document(json!({"id": 1})));
        state.unassign("delta");
        assert!(state.diff(&schema).is_empty());
    }

    #[test]
    fn delete_then_reassign_converges_to_last_value() {
        let schema = schema();
        let mut state = InstanceState::from_loaded(document(json!({"id": 1, "meta": "onigiri"})));
        state.unassign("meta");
        state.assign("meta", json!("ramen"));

        let diff = state.diff(&schema);
        assert_eq!(diff.set, document(json!({"meta": "ramen"})));
        assert!(diff.unset.is_empty());
    }

    #[test]
    fn specified_fields_is_none_after_hydration() {
        let mut state = InstanceState::new();
        state.assign("meta", json!("onigiri"));
        assert_eq!(state.specified_fields().map(|f| f.len()), Some(1));

        state.hydrate(document(json!({"id": 1})));
        assert!(state.specified_fields().is_none());
        assert!(!state.is_dirty());
    }

    #[test]
    fn self_referencing_default_stops_at_depth_limit() {
        let schema = Schema::builder("loops")
            .field(
                "echo",
                Attribute::new().default_with(|instance| instance.get("echo")),
            )
            .build();

        assert_eq!(InstanceState::new().resolve(&schema, "echo"), Value::Null);
    }
}

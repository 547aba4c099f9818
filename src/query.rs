//! Translation of `get`-style requests into store filter/projection pairs.

use crate::config::SessionConfig;
use crate::core::{ConsysError, Document, Result, values_equal};
use crate::schema::{SYSTEM_FIELDS, Schema};
use crate::store::Projection;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashSet};

/// Identifier selection: one document, or a best-effort batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Ids {
    One(Value),
    Many(Vec<Value>),
}

impl From<Value> for Ids {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Ids::Many(items),
            value => Ids::One(value),
        }
    }
}

impl From<&Value> for Ids {
    fn from(value: &Value) -> Self {
        Ids::from(value.clone())
    }
}

macro_rules! ids_from_scalar {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Ids {
                fn from(value: $ty) -> Self {
                    Ids::One(Value::from(value))
                }
            }
        )+
    };
}

ids_from_scalar!(&str, String, i32, i64, u32, u64);

impl<T: Into<Value>> From<Vec<T>> for Ids {
    fn from(values: Vec<T>) -> Self {
        Ids::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Ids {
    fn from(values: [T; N]) -> Self {
        Ids::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashSet<T>> for Ids {
    fn from(values: HashSet<T>) -> Self {
        Ids::Many(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Ids {
    fn from(values: BTreeSet<T>) -> Self {
        Ids::Many(values.into_iter().map(Into::into).collect())
    }
}

/// A read request against one model type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    ids: Option<Ids>,
    fields: Option<BTreeSet<String>>,
    conditions: Vec<(String, Value)>,
    extra: Document,
    search: Option<String>,
}

impl Query {
    /// Selects every document of the collection.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_ids(ids: impl Into<Ids>) -> Self {
        Self::new().ids(ids)
    }

    pub fn ids(mut self, ids: impl Into<Ids>) -> Self {
        self.ids = Some(ids.into());
        self
    }

    /// Restricts the returned fields; an empty list means system fields only.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Condition on a declared field (dotted paths reach into mappings).
    /// The value is either a plain value or an operator document such as
    /// `{"$exists": false}`.
    pub fn condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Raw store condition, passed through untouched.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn selected_ids(&self) -> Option<&Ids> {
        self.ids.as_ref()
    }
}

/// What the engine sends to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    pub filter: Document,
    pub projection: Projection,
    /// Set when exactly one identifier was selected; a miss is then an error.
    pub single: Option<Value>,
}

pub struct QueryTranslator<'a> {
    schema: &'a Schema,
    case_insensitive: bool,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(schema: &'a Schema, config: &SessionConfig) -> Self {
        Self {
            schema,
            case_insensitive: config.case_insensitive_search,
        }
    }

    pub fn translate(&self, query: &Query) -> Result<StoreRequest> {
        let mut clauses = Vec::new();
        let mut single = None;

        if let Some(ids) = &query.ids {
            let (clause, one) = self.selection(ids)?;
            clauses.push(clause);
            single = one;
        }

        for (field, value) in &query.conditions {
            clauses.push(self.condition(field, value)?);
        }

        for (key, value) in &query.extra {
            clauses.push(single_entry(key.clone(), value.clone()));
        }

        if let Some(clause) = query.search.as_deref().and_then(|text| self.search(text)) {
            clauses.push(clause);
        }

        Ok(StoreRequest {
            filter: combine(clauses),
            projection: self.projection(query.fields.as_ref()),
            single,
        })
    }

    /// Projection used by complex retrieval: exactly the requested fields.
    pub fn exact_projection(&self, fields: &BTreeSet<String>) -> Projection {
        if fields.is_empty() {
            system_projection()
        } else {
            Projection::Include(fields.clone())
        }
    }

    fn projection(&self, fields: Option<&BTreeSet<String>>) -> Projection {
        match fields {
            None => Projection::All,
            Some(fields) if fields.is_empty() => system_projection(),
            Some(fields) => {
                let mut included = fields.clone();
                included.insert("id".to_string());
                Projection::Include(included)
            }
        }
    }

    fn selection(&self, ids: &Ids) -> Result<(Document, Option<Value>)> {
        match ids {
            Ids::One(id) => {
                if !is_selectable(id) {
                    return Err(ConsysError::Selection(format!(
                        "identifier {} selects no document",
                        id
                    )));
                }
                Ok((single_entry("id".to_string(), id.clone()), Some(id.clone())))
            }
            Ids::Many(values) => {
                let mut unique: Vec<Value> = Vec::new();
                for id in values.iter().filter(|id| is_selectable(id)) {
                    if !unique.iter().any(|seen| values_equal(seen, id)) {
                        unique.push(id.clone());
                    }
                }
                if unique.is_empty() {
                    return Err(ConsysError::Selection(
                        "identifier collection is empty".to_string(),
                    ));
                }
                Ok((
                    single_entry("id".to_string(), json!({ "$in": unique })),
                    None,
                ))
            }
        }
    }

    fn condition(&self, field: &str, value: &Value) -> Result<Document> {
        if !self.schema.contains_path(field) {
            return Err(ConsysError::UnknownField(field.to_string()));
        }

        if is_operator_document(value) {
            return Ok(single_entry(field.to_string(), value.clone()));
        }

        // a stored document omits fields equal to their default
        let default = self
            .schema
            .attribute(field)
            .and_then(|attribute| attribute.literal_default());
        match default {
            Some(default) if !default.is_null() && values_equal(&default, value) => {
                Ok(single_entry(
                    "$or".to_string(),
                    json!([
                        { field: value },
                        { field: { "$exists": false } },
                    ]),
                ))
            }
            _ => Ok(single_entry(field.to_string(), value.clone())),
        }
    }

    fn search(&self, text: &str) -> Option<Document> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let pattern = regex::escape(text);
        let options = if self.case_insensitive { "i" } else { "" };
        let alternatives: Vec<Value> = self
            .schema
            .text_fields()
            .map(|field| json!({ field: { "$regex": pattern, "$options": options } }))
            .collect();

        if alternatives.is_empty() {
            return Some(single_entry(
                "id".to_string(),
                json!({ "$in": Vec::<Value>::new() }),
            ));
        }
        Some(single_entry("$or".to_string(), Value::Array(alternatives)))
    }
}

fn system_projection() -> Projection {
    Projection::include(SYSTEM_FIELDS)
}

fn is_selectable(id: &Value) -> bool {
    match id {
        Value::Null => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => false,
    }
}

fn is_operator_document(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|key| key.starts_with('$')),
        _ => false,
    }
}

fn single_entry(key: String, value: Value) -> Document {
    let mut document = Document::new();
    document.insert(key, value);
    document
}

/// Merges clauses into one filter, falling back to `$and` on key clashes.
fn combine(clauses: Vec<Document>) -> Document {
    let mut merged = Document::new();
    let mut clashing = false;
    for clause in &clauses {
        for (key, value) in clause {
            if merged.contains_key(key) {
                clashing = true;
                break;
            }
            merged.insert(key.clone(), value.clone());
        }
        if clashing {
            break;
        }
    }

    if !clashing {
        return merged;
    }

    let all: Vec<Value> = clauses.into_iter().map(Value::Object).collect();
    single_entry("$and".to_string(), Value::Array(all))
}

//! Attribute descriptors.
//!
//! An [`Attribute`] declares one field of a model: which value kinds it
//! accepts, what its default is, and the plug-in functions consulted when a
//! value is assigned. Assignment runs, in order:
//!
//! 1. `pre_processor` (raw input to canonical form),
//! 2. the structural type check against `types`,
//! 3. `checker(identifier, value)`,
//! 4. `post_processor` (e.g. hashing).

use crate::core::{ConsysError, Result, ValueKind};
use crate::state::InstanceView;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// `checker(identifier, candidate) -> accepted`
pub type Checker = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;
/// Value transform applied on assignment.
pub type Processor = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;
/// Default computed from the owning instance.
pub type ComputedDefault = Arc<dyn Fn(&InstanceView<'_>) -> Value + Send + Sync>;

#[derive(Clone)]
enum DefaultValue {
    Null,
    Literal(Value),
    Computed(ComputedDefault),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Null => f.write_str("Null"),
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[derive(Clone)]
pub struct Attribute {
    name: String,
    types: Vec<ValueKind>,
    default: DefaultValue,
    checker: Option<Checker>,
    pre_processor: Option<Processor>,
    post_processor: Option<Processor>,
    unique: bool,
}

impl Attribute {
    /// An attribute accepting any value kind, defaulting to null.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            types: Vec::new(),
            default: DefaultValue::Null,
            checker: None,
            pre_processor: None,
            post_processor: None,
            unique: false,
        }
    }

    /// Shorthand for an attribute restricted to a single kind.
    pub fn of(kind: ValueKind) -> Self {
        Self::new().kind(kind)
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        if !self.types.contains(&kind) {
            self.types.push(kind);
        }
        self
    }

    pub fn types(mut self, kinds: impl IntoIterator<Item = ValueKind>) -> Self {
        for kind in kinds {
            self = self.kind(kind);
        }
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = match value.into() {
            Value::Null => DefaultValue::Null,
            value => DefaultValue::Literal(value),
        };
        self
    }

    /// Default computed lazily from the instance's other fields.
    ///
    /// Evaluated every time the field has neither an explicit nor a loaded
    /// value, so it follows changes of the fields it reads (e.g. `id`).
    pub fn default_with<F>(mut self, default: F) -> Self
    where
        F: Fn(&InstanceView<'_>) -> Value + Send + Sync + 'static,
    {
        self.default = DefaultValue::Computed(Arc::new(default));
        self
    }

    pub fn checker<F>(mut self, checker: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.checker = Some(Arc::new(checker));
        self
    }

    pub fn pre_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.pre_processor = Some(Arc::new(processor));
        self
    }

    pub fn post_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.post_processor = Some(Arc::new(processor));
        self
    }

    /// Rejects saves that would store a value another document already holds.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kinds(&self) -> &[ValueKind] {
        &self.types
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// The default when it does not depend on instance state.
    pub fn literal_default(&self) -> Option<Value> {
        match &self.default {
            DefaultValue::Null => Some(Value::Null),
            DefaultValue::Literal(value) => Some(value.clone()),
            DefaultValue::Computed(_) => None,
        }
    }

    pub fn resolve_default(&self, view: &InstanceView<'_>) -> Value {
        match &self.default {
            DefaultValue::Null => Value::Null,
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Computed(default) => default(view),
        }
    }

    /// Whether the value's kind is one of the declared types. An attribute
    /// without declared types accepts anything.
    pub fn accepts(&self, value: &Value) -> bool {
        self.types.is_empty() || self.types.iter().any(|kind| kind.matches(value))
    }

    pub fn accepts_text(&self) -> bool {
        self.types.is_empty() || self.types.contains(&ValueKind::String)
    }

    /// Turns a raw assigned value into the form that is stored.
    pub fn prepare(&self, identifier: &Value, raw: Value) -> Result<Value> {
        let value = match &self.pre_processor {
            Some(processor) => processor(raw)?,
            None => raw,
        };

        if !self.accepts(&value) {
            let expected = self
                .types
                .iter()
                .map(ValueKind::name)
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(ConsysError::Type {
                field: self.name.clone(),
                expected,
                value,
            });
        }

        if let Some(checker) = &self.checker {
            if !checker(identifier, &value) {
                return Err(ConsysError::validation(self.name.clone(), value));
            }
        }

        match &self.post_processor {
            Some(processor) => processor(value),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("types", &self.types)
            .field("default", &self.default)
            .field("checker", &self.checker.is_some())
            .field("pre_processor", &self.pre_processor.is_some())
            .field("post_processor", &self.post_processor.is_some())
            .field("unique", &self.unique)
            .finish()
    }
}

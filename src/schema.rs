//! Per-model-type field registry.

use crate::attribute::Attribute;
use crate::core::ValueKind;
use crate::persist::Model;
use std::collections::HashMap;

/// Fields present on every model, in storage order.
pub const SYSTEM_FIELDS: [&str; 6] = ["id", "created", "updated", "status", "user", "title"];

/// Ordered, immutable mapping from field name to [`Attribute`], plus the
/// name of the collection that backs the model type.
#[derive(Debug)]
pub struct Schema {
    collection: String,
    attributes: Vec<Attribute>,
    positions: HashMap<String, usize>,
    declares_id: bool,
}

impl Schema {
    pub fn builder(collection: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(collection)
    }

    /// The schema registered for model type `M`.
    pub fn for_type<M: Model>() -> &'static Schema {
        M::schema()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.positions.get(name).map(|&idx| &self.attributes[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Whether a dotted path addresses a declared field (or something nested in one).
    pub fn contains_path(&self, path: &str) -> bool {
        let head = path.split('.').next().unwrap_or(path);
        self.contains(head)
    }

    /// (name, attribute) pairs in declaration order, system fields first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|attr| (attr.name(), attr))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(Attribute::name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// True when the model redeclares `id` itself; such models never get
    /// generated identifiers.
    pub fn declares_id(&self) -> bool {
        self.declares_id
    }

    pub fn is_system(name: &str) -> bool {
        SYSTEM_FIELDS.contains(&name)
    }

    /// Fields free-text search looks into.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|attr| attr.accepts_text())
            .map(Attribute::name)
    }
}

pub struct SchemaBuilder {
    collection: String,
    attributes: Vec<Attribute>,
    declares_id: bool,
}

impl SchemaBuilder {
    fn new(collection: impl Into<String>) -> Self {
        let attributes = vec![
            Attribute::new()
                .types([ValueKind::String, ValueKind::Integer])
                .named("id"),
            Attribute::of(ValueKind::Number).named("created"),
            Attribute::of(ValueKind::Number).named("updated"),
            Attribute::of(ValueKind::Integer).named("status"),
            Attribute::new()
                .types([ValueKind::Integer, ValueKind::String])
                .named("user"),
            Attribute::of(ValueKind::String).named("title"),
        ];

        Self {
            collection: collection.into(),
            attributes,
            declares_id: false,
        }
    }

    /// Declares a field. Redeclaring a system field replaces it in place.
    pub fn field(mut self, name: &str, attribute: Attribute) -> Self {
        let attribute = attribute.named(name);
        if name == "id" {
            self.declares_id = true;
        }

        match self.attributes.iter().position(|attr| attr.name() == name) {
            Some(idx) => self.attributes[idx] = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn build(self) -> Schema {
        let positions = self
            .attributes
            .iter()
            .enumerate()
            .map(|(idx, attr)| (attr.name().to_string(), idx))
            .collect();

        Schema {
            collection: self.collection,
            attributes: self.attributes,
            positions,
            declares_id: self.declares_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_fields_come_first_in_declaration_order() {
        let schema = Schema::builder("tests")
            .field("meta", Attribute::of(ValueKind::String))
            .field("delta", Attribute::of(ValueKind::String).default(""))
            .build();

        let names: Vec<&str> = schema.names().collect();
        assert_eq!(
            names,
            vec!["id", "created", "updated", "status", "user", "title", "meta", "delta"]
        );
        assert!(!schema.declares_id());
        assert_eq!(schema.collection(), "tests");
    }

    #[test]
    fn redeclared_system_field_keeps_its_slot() {
        let schema = Schema::builder("tests2")
            .field("id", Attribute::of(ValueKind::String))
            .build();

        assert!(schema.declares_id());
        assert_eq!(schema.names().next(), Some("id"));
        assert_eq!(schema.len(), SYSTEM_FIELDS.len());
        assert_eq!(
            schema.attribute("id").map(|attr| attr.value_kinds().to_vec()),
            Some(vec![ValueKind::String])
        );
    }

    #[test]
    fn dotted_paths_resolve_through_their_head() {
        let schema = Schema::builder("tests")
            .field("sodzu", Attribute::of(ValueKind::Mapping))
            .build();

        assert!(schema.contains_path("sodzu.sake"));
        assert!(!schema.contains_path("sake.sodzu"));
    }

    #[test]
    fn text_fields_cover_string_typed_attributes() {
        let schema = Schema::builder("tests")
            .field("meta", Attribute::of(ValueKind::String))
            .field("multi", Attribute::of(ValueKind::Sequence))
            .build();

        let text: Vec<&str> = schema.text_fields().collect();
        assert!(text.contains(&"id"));
        assert!(text.contains(&"title"));
        assert!(text.contains(&"meta"));
        assert!(!text.contains(&"multi"));
    }
}

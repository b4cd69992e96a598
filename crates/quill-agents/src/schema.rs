//! Provider-neutral function declarations and their wire-schema renderings.
//!
//! Tools declare their parameters once with [`Schema`]; the Gemini side keeps
//! the typed tags (uppercase wire names), while OpenAI-compatible endpoints
//! get a plain JSON-Schema rendering via [`translate`].

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

/// Closed set of parameter types a tool schema can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    /// Lowercase JSON-Schema tag for OpenAI-compatible endpoints.
    pub fn json_tag(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }

    /// Uppercase tag as the Gemini API spells it.
    pub fn gemini_tag(self) -> &'static str {
        match self {
            SchemaType::String => "STRING",
            SchemaType::Number => "NUMBER",
            SchemaType::Integer => "INTEGER",
            SchemaType::Boolean => "BOOLEAN",
            SchemaType::Array => "ARRAY",
            SchemaType::Object => "OBJECT",
        }
    }
}

/// Parameter schema for a declared tool. `schema_type` of `None` means the
/// node carries no recognized type tag and passes through untranslated.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub schema_type: Option<SchemaType>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, Schema>,
    pub items: Option<Box<Schema>>,
    pub required: Vec<String>,
    pub enum_values: Vec<String>,
}

impl Schema {
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new(SchemaType::String).with_description(description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::new(SchemaType::Integer).with_description(description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new(SchemaType::Boolean).with_description(description)
    }

    pub fn array_of(items: Schema) -> Self {
        let mut schema = Self::new(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn object(properties: impl IntoIterator<Item = (&'static str, Schema)>) -> Self {
        let mut schema = Self::new(SchemaType::Object);
        schema.properties = properties
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        schema
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_required(mut self, required: &[&str]) -> Self {
        self.required = required.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A registered capability the model may call.
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

/// Render a schema as plain JSON-Schema for OpenAI-compatible endpoints.
///
/// Pure: remaps the closed set of type tags to their lowercase string
/// equivalents and recurses into `properties` and `items`. A node without a
/// recognized type tag comes through as a shallow copy with no `type` field.
pub fn translate(schema: &Schema) -> Value {
    render(schema, SchemaType::json_tag)
}

/// Render a schema in Gemini's typed-tag spelling.
pub fn to_gemini(schema: &Schema) -> Value {
    render(schema, SchemaType::gemini_tag)
}

fn render(schema: &Schema, tag: fn(SchemaType) -> &'static str) -> Value {
    let mut out = Map::new();
    if let Some(schema_type) = schema.schema_type {
        out.insert("type".to_string(), json!(tag(schema_type)));
    }
    if let Some(description) = &schema.description {
        out.insert("description".to_string(), json!(description));
    }
    if !schema.properties.is_empty() {
        let properties: Map<String, Value> = schema
            .properties
            .iter()
            .map(|(name, child)| (name.clone(), render(child, tag)))
            .collect();
        out.insert("properties".to_string(), Value::Object(properties));
    }
    if let Some(items) = &schema.items {
        out.insert("items".to_string(), render(items, tag));
    }
    if !schema.required.is_empty() {
        out.insert("required".to_string(), json!(schema.required));
    }
    if !schema.enum_values.is_empty() {
        out.insert("enum".to_string(), json!(schema.enum_values));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_nested_object() {
        let schema = Schema::object([
            ("query", Schema::string("Search query")),
            (
                "tags",
                Schema::array_of(Schema::new(SchemaType::String)),
            ),
        ])
        .with_required(&["query"]);

        let value = translate(&schema);
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["query"]["type"], "string");
        assert_eq!(value["properties"]["query"]["description"], "Search query");
        assert_eq!(value["properties"]["tags"]["type"], "array");
        assert_eq!(value["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(value["required"], serde_json::json!(["query"]));
    }

    #[test]
    fn untyped_node_passes_through_without_type_tag() {
        let schema = Schema {
            description: Some("anything goes".to_string()),
            ..Schema::default()
        };
        let value = translate(&schema);
        assert!(value.get("type").is_none());
        assert_eq!(value["description"], "anything goes");
    }

    #[test]
    fn gemini_rendering_uses_uppercase_tags() {
        let schema = Schema::object([("count", Schema::integer("How many"))]);
        let value = to_gemini(&schema);
        assert_eq!(value["type"], "OBJECT");
        assert_eq!(value["properties"]["count"]["type"], "INTEGER");
    }

    #[test]
    fn enum_values_survive_translation() {
        let schema = Schema::string("Sort order").with_enum(&["asc", "desc"]);
        let value = translate(&schema);
        assert_eq!(value["enum"], serde_json::json!(["asc", "desc"]));
    }
}

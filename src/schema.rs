//! Translation of MCP tool input schemas into Gemini parameter schemas.
//!
//! Only the top-level object and its direct properties are translated.
//! A property that is itself an object or array keeps its type tag and
//! description; its nested `properties` / `items` are dropped.

use crate::gemini::{Schema, Type};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A JSON Schema type tag with no Gemini counterpart
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("type not supported by Gemini schemas: {0}")]
pub struct UnsupportedTypeError(pub String);

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
    #[error("malformed input schema: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Map a JSON Schema type tag to its Gemini equivalent.
pub fn map_type(tag: &str) -> Result<Type, UnsupportedTypeError> {
    match tag {
        "object" => Ok(Type::Object),
        "array" => Ok(Type::Array),
        "string" => Ok(Type::String),
        "number" => Ok(Type::Number),
        "integer" => Ok(Type::Integer),
        "boolean" => Ok(Type::Boolean),
        other => Err(UnsupportedTypeError(other.to_string())),
    }
}

/// Inverse of [`map_type`]
pub fn json_type(ty: Type) -> &'static str {
    match ty {
        Type::Object => "object",
        Type::Array => "array",
        Type::String => "string",
        Type::Number => "number",
        Type::Integer => "integer",
        Type::Boolean => "boolean",
    }
}

/// Input schema as declared by an MCP tool
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyNode>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// A direct property of a [`SchemaNode`]
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyNode {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SchemaNode {
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        Ok(SchemaNode::deserialize(value)?)
    }

    /// Build the Gemini schema. Nothing is returned unless every tag maps.
    pub fn translate(&self) -> Result<Schema, UnsupportedTypeError> {
        let schema_type = map_type(&self.type_tag)?;

        let mut properties = BTreeMap::new();
        for (name, prop) in &self.properties {
            let prop_type = map_type(&prop.type_tag)?;
            properties.insert(name.clone(), Schema::leaf(prop_type, prop.description.clone()));
        }

        Ok(Schema {
            schema_type,
            description: None,
            properties,
            required: self.required.clone(),
        })
    }
}

/// Parse and translate a raw `inputSchema` value
pub fn translate_input_schema(value: &Value) -> Result<Schema, SchemaError> {
    Ok(SchemaNode::from_json(value)?.translate()?)
}

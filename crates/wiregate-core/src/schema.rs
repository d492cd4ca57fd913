//! Named schema definitions supplied by the application at startup.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};

/// A named structured-data definition. Immutable once registered; the
/// registry keys everything by the schema's name (its subject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Subject name, conventionally matching the topic the schema encodes.
    pub name: String,

    /// The schema definition body as JSON (e.g. an Avro record definition).
    pub definition: serde_json::Value,
}

impl Schema {
    pub fn new(name: impl Into<String>, definition: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    /// Build a schema from a definition that carries its own `name` field,
    /// the way Avro record definitions do.
    pub fn from_definition(definition: serde_json::Value) -> Result<Self> {
        let name = definition
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| {
                WireError::InvalidSchema("definition has no top-level \"name\" field".to_string())
            })?
            .to_string();
        Ok(Self { name, definition })
    }

    /// Registry-side subject key for this schema.
    pub fn subject(&self) -> &str {
        &self.name
    }

    /// JSON text of the definition, as registry request bodies expect it.
    pub fn definition_json(&self) -> Result<String> {
        serde_json::to_string(&self.definition)
            .map_err(|e| WireError::InvalidSchema(e.to_string()))
    }
}

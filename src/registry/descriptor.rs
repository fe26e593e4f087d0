//! JSON model descriptors (the `<model>.json` files shipped next to each graph)
//!
//! Every field is optional at the serde level so that a descriptor with a
//! missing field still parses; resolution decides what is required.

use crate::error::RegistryError;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Descriptor for either a classification head or a feature extractor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub name: Option<String>,
    pub version: Option<Value>,
    pub description: Option<String>,
    pub classes: Vec<String>,
    pub inference: InferenceSection,
    pub schema: SchemaSection,

    // Provenance
    pub author: Option<Value>,
    pub email: Option<Value>,
    pub release_date: Option<Value>,
    pub framework: Option<Value>,
    pub framework_version: Option<Value>,
    pub dataset: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub algorithm: Option<String>,
    pub sample_rate: Option<u32>,
    pub embedding_model: Option<EmbeddingReference>,
}

/// `inference.embedding_model` of a classification head
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingReference {
    pub algorithm: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaSection {
    pub inputs: Vec<NodeDescriptor>,
    pub outputs: Vec<NodeDescriptor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeDescriptor {
    pub name: Option<String>,
    pub output_purpose: Option<String>,
    pub shape: Option<Value>,
}

impl ModelDescriptor {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Err(RegistryError::DescriptorNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Name of the first declared input
    pub fn input_node(&self) -> Option<&str> {
        self.schema
            .inputs
            .first()
            .and_then(|input| input.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Name of the output whose `output_purpose` matches
    pub fn output_node(&self, purpose: &str) -> Option<&str> {
        self.schema
            .outputs
            .iter()
            .find(|output| output.output_purpose.as_deref() == Some(purpose))
            .and_then(|output| output.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Shape of the first declared input. Non-integer dimensions become -1.
    pub fn input_shape(&self) -> Option<Vec<i64>> {
        let shape = self.schema.inputs.first()?.shape.as_ref()?.as_array()?;
        Some(shape.iter().map(|dim| dim.as_i64().unwrap_or(-1)).collect())
    }

    /// `version` may be written as a string or a number
    pub fn version_string(&self) -> Option<String> {
        self.version.as_ref().map(value_to_string)
    }
}

/// Render a provenance value as text. Objects use their `name` entry when present.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

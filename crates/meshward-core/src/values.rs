//! Chart values with typed dotted-path lookups

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container read from `values.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get a boolean by dotted path
    ///
    /// A key present without a value (`key:` in YAML) reads as `false`, an
    /// absent key as `None`. Any other non-boolean value is an error.
    pub fn get_bool(&self, path: &str) -> Result<Option<bool>> {
        match self.get(path) {
            None => Ok(None),
            Some(JsonValue::Null) => Ok(Some(false)),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(CoreError::InvalidValue {
                path: path.to_string(),
                message: format!("expected a boolean, found {}", other),
            }),
        }
    }

    /// Get a string by dotted path; `null` reads as absent
    pub fn get_str(&self, path: &str) -> Result<Option<&str>> {
        match self.get(path) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(CoreError::InvalidValue {
                path: path.to_string(),
                message: format!("expected a string, found {}", other),
            }),
        }
    }
}

fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

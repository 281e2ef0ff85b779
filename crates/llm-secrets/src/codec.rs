//! Plaintext form of the store: a flat YAML mapping of key to string value.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::error::{Result, SecretsError};

/// Decrypted store contents. Ordered, so listings are always sorted.
pub type SecretMap = BTreeMap<String, String>;

/// Serialize a mapping to YAML text
pub fn serialize(secrets: &SecretMap) -> Result<String> {
    serde_yaml::to_string(secrets).map_err(|e| SecretsError::Codec(e.to_string()))
}

/// Parse YAML text into a mapping.
///
/// Empty input is an empty store. Numbers, booleans and nulls written by
/// hand are accepted and stringified; nested structures are rejected.
pub fn deserialize(text: &str) -> Result<SecretMap> {
    if text.trim().is_empty() {
        return Ok(SecretMap::new());
    }

    let document: Value = serde_yaml::from_str(text).map_err(|e| {
        // The error's own message may quote the offending text
        let location = e
            .location()
            .map(|loc| format!("line {}, column {}", loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());
        SecretsError::Codec(format!("invalid YAML at {location}"))
    })?;

    let mapping = match document {
        Value::Null => return Ok(SecretMap::new()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(SecretsError::Codec(format!(
                "expected a key/value mapping, found {}",
                kind(&other)
            )))
        }
    };

    let mut secrets = SecretMap::new();
    for (key, value) in mapping {
        let key = scalar_to_string(key)
            .ok_or_else(|| SecretsError::Codec("keys must be scalars".to_string()))?;
        let value = scalar_to_string(value).ok_or_else(|| {
            SecretsError::Codec(format!("value of '{key}' must be a scalar, not a nested structure"))
        })?;
        secrets.insert(key, value);
    }

    Ok(secrets)
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// src/hydrator.rs

//! Turns caller-supplied identifying data into a cache key.
//!
//! A plain string is used as-is after the key prefix. A composite (a JSON object
//! or array of attributes) is rendered in a canonical order and digested, so two
//! equal composites always address the same record no matter how the caller
//! built them. Any other shape is rejected before the cache is touched.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::default_key_prefix;
use crate::error::{Result, ThrottleError};

/// Hydration strategy selected from the runtime shape of the identifying data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydrator {
    /// A string identifier used directly as the key suffix
    Text,
    /// A set of attributes combined into a single digest
    Composite,
}

impl Hydrator {
    /// Build the cache key for `data` under `prefix`
    pub fn hydrate(&self, data: &Value, prefix: &str) -> Result<String> {
        match (self, data) {
            (Hydrator::Text, Value::String(text)) => Ok(format!("{}:{}", prefix, text)),
            (Hydrator::Composite, Value::Object(_) | Value::Array(_)) => {
                let mut material = String::new();
                canonicalize(data, &mut material);
                let digest = Sha256::digest(material.as_bytes());
                Ok(format!("{}:#{:x}", prefix, digest))
            }
            _ => Err(ThrottleError::InvalidIdentifierType(format!(
                "{:?} hydrator cannot handle {}",
                self,
                shape(data)
            ))),
        }
    }
}

/// Picks a [`Hydrator`] for identifying data and applies the key prefix
#[derive(Debug, Clone)]
pub struct HydratorFactory {
    key_prefix: String,
}

impl Default for HydratorFactory {
    fn default() -> Self {
        Self::new(default_key_prefix())
    }
}

impl HydratorFactory {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Select the hydration strategy for `data`
    pub fn make(&self, data: &Value) -> Result<Hydrator> {
        match data {
            Value::String(_) => Ok(Hydrator::Text),
            Value::Object(map) if !map.is_empty() => Ok(Hydrator::Composite),
            Value::Array(items) if !items.is_empty() => Ok(Hydrator::Composite),
            other => Err(ThrottleError::InvalidIdentifierType(format!(
                "data type not supported: {}",
                shape(other)
            ))),
        }
    }

    /// Select a strategy and build the cache key in one step
    pub fn hydrate(&self, data: &Value) -> Result<String> {
        self.make(data)?.hydrate(data, &self.key_prefix)
    }
}

fn shape(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(items) if items.is_empty() => "empty array",
        Value::Array(_) => "array",
        Value::Object(map) if map.is_empty() => "empty object",
        Value::Object(_) => "object",
    }
}

// Object fields are sorted by name; array order is significant.
fn canonicalize(data: &Value, out: &mut String) {
    match data {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, value)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                canonicalize(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, value) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonicalize(value, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

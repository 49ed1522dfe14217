//! Per-run store of step outputs keyed by output key

use crate::execution::resolver::Reference;
use serde_json::{Map, Value};
use tracing::debug;

/// Created empty for every plan run and dropped when the run ends.
#[derive(Debug, Default, Clone)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Walk a dot path. Every hop must land on a map holding the next key.
    pub fn lookup(&self, reference: &Reference) -> Option<&Value> {
        let mut segments = reference.segments().iter();
        let first = segments.next()?;

        let Some(mut current) = self.values.get(first.as_str()) else {
            debug!(
                path = %reference,
                missing = %first,
                available = ?self.keys(),
                "Reference root not found in execution context"
            );
            return None;
        };

        for segment in segments {
            match current {
                Value::Object(map) => match map.get(segment.as_str()) {
                    Some(next) => current = next,
                    None => {
                        debug!(
                            path = %reference,
                            missing = %segment,
                            available = ?map.keys().collect::<Vec<_>>(),
                            "Key not found while resolving reference"
                        );
                        return None;
                    }
                },
                other => {
                    debug!(
                        path = %reference,
                        segment = %segment,
                        found = value_kind(other),
                        "Cannot traverse into non-map value"
                    );
                    return None;
                }
            }
        }

        Some(current)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

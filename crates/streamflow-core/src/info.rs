//! Sideband info accumulation.

use serde_json::{Map, Value};
use streamflow_traits::{Result, StreamError};

const CITATIONS_KEY: &str = "citations";

/// Decode an `info` payload into a JSON object.
///
/// Strings are parsed as JSON. Anything that is not (or does not decode to)
/// an object is a parse error; callers degrade it to an empty object.
pub fn parse_info(raw: &Value) -> Result<Map<String, Value>> {
    let value = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text)?,
        other => other.clone(),
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(StreamError::Parse(format!(
            "info is not an object: {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Merged sideband info for one session.
///
/// Keys are merged shallowly, later values winning, except `citations`,
/// which grows by concatenation and is never deduplicated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AccumulatedInfo {
    fields: Map<String, Value>,
}

impl AccumulatedInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if key == CITATIONS_KEY {
                self.append_citations(value);
            } else {
                self.fields.insert(key, value);
            }
        }
    }

    fn append_citations(&mut self, value: Value) {
        let incoming = match value {
            Value::Array(items) => items,
            Value::Null => return,
            single => vec![single],
        };
        match self.fields.get_mut(CITATIONS_KEY) {
            Some(Value::Array(existing)) => existing.extend(incoming),
            _ => {
                self.fields
                    .insert(CITATIONS_KEY.to_string(), Value::Array(incoming));
            }
        }
    }

    pub fn citations(&self) -> &[Value] {
        match self.fields.get(CITATIONS_KEY) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialized form stored in `FinalMessage::tool`
    pub fn to_json_string(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

//! Typed argument extraction from operation inputs.
//!
//! Every accessor names the offending parameter in its `bad-request` error,
//! which is the §-level contract the dispatcher relies on.

use serde_json::{Map, Value};

use crate::error::{OpError, OpResult};

pub struct Params<'a> {
    args: &'a Map<String, Value>,
}

fn empty_map() -> &'static Map<String, Value> {
    static MAP: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    MAP.get_or_init(Map::new)
}

impl<'a> Params<'a> {
    /// Wraps an operation's arguments. Accepts `null` (no arguments) or an
    /// object; anything else is a `bad-request`.
    pub fn new(args: &'a Value) -> OpResult<Self> {
        match args {
            Value::Null => Ok(Self { args: empty_map() }),
            Value::Object(map) => Ok(Self { args: map }),
            other => Err(OpError::bad_request(format!(
                "arguments must be an object, got {}",
                type_name(other)
            ))),
        }
    }

    pub fn required_str(&self, key: &str) -> OpResult<&'a str> {
        match self.args.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(type_error(key, "string", other)),
            None => Err(OpError::bad_parameter(
                key,
                format!("missing required parameter {key}"),
            )),
        }
    }

    pub fn optional_str(&self, key: &str) -> OpResult<Option<&'a str>> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(key, "string", other)),
        }
    }

    pub fn optional_bool(&self, key: &str, default: bool) -> OpResult<bool> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(type_error(key, "boolean", other)),
        }
    }

    pub fn optional_usize(&self, key: &str, default: usize) -> OpResult<usize> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| type_error_message(key, "non-negative integer", n.to_string())),
            Some(other) => Err(type_error(key, "integer", other)),
        }
    }

    pub fn required_u16(&self, key: &str) -> OpResult<u16> {
        match self.args.get(key) {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| type_error_message(key, "16-bit integer", n.to_string())),
            Some(other) => Err(type_error(key, "integer", other)),
            None => Err(OpError::bad_parameter(
                key,
                format!("missing required parameter {key}"),
            )),
        }
    }

    pub fn required_f64(&self, key: &str) -> OpResult<f64> {
        match self.args.get(key) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| type_error_message(key, "number", n.to_string())),
            Some(other) => Err(type_error(key, "number", other)),
            None => Err(OpError::bad_parameter(
                key,
                format!("missing required parameter {key}"),
            )),
        }
    }

    pub fn required_str_list(&self, key: &str) -> OpResult<Vec<&'a str>> {
        match self.args.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.as_str()),
                    other => Err(type_error(key, "list of strings", other)),
                })
                .collect(),
            Some(other) => Err(type_error(key, "list of strings", other)),
            None => Err(OpError::bad_parameter(
                key,
                format!("missing required parameter {key}"),
            )),
        }
    }

    pub fn optional_object(&self, key: &str) -> OpResult<Option<&'a Map<String, Value>>> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(type_error(key, "object", other)),
        }
    }
}

fn type_error(key: &str, expected: &str, got: &Value) -> OpError {
    type_error_message(key, expected, type_name(got).to_string())
}

fn type_error_message(key: &str, expected: &str, got: String) -> OpError {
    OpError::bad_parameter(
        key,
        format!("parameter {key} must be a {expected}, got {got}"),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_parameter_names_it() {
        let args = json!({});
        let params = Params::new(&args).unwrap();
        let err = params.required_str("class").unwrap_err();
        match err {
            OpError::BadRequest { parameter, .. } => {
                assert_eq!(parameter.as_deref(), Some("class"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typed_accessors_validate() {
        let args = json!({
            "flag": true,
            "count": 5,
            "names": ["a", "b"],
            "bad": "text",
        });
        let params = Params::new(&args).unwrap();
        assert!(params.optional_bool("flag", false).unwrap());
        assert_eq!(params.optional_usize("count", 0).unwrap(), 5);
        assert_eq!(params.required_str_list("names").unwrap(), vec!["a", "b"]);
        assert!(params.optional_usize("bad", 0).is_err());
        assert_eq!(params.optional_usize("absent", 7).unwrap(), 7);
    }
}

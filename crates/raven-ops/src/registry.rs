//! Operation descriptors and the dispatcher.
//!
//! Every operation is a `(name, input schema, handler)` triple. The
//! dispatcher extracts arguments, invokes the handler under the central
//! error policy (including a panic guard), and stamps the response; handlers
//! stay pure with respect to transport concerns.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::context::ServerContext;
use crate::error::{OpError, OpResult};
use crate::params::Params;

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    /// One of `string`, `int`, `number`, `bool`, `string-list`, `object`.
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            default: None,
        }
    }

    pub const fn with_default(
        name: &'static str,
        kind: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            default: Some(default),
        }
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.kind,
            "description": self.description,
        });
        if let Some(default) = self.default {
            schema["default"] = json!(default);
        }
        schema
    }
}

pub type Handler = fn(&ServerContext, &Params<'_>) -> OpResult<Value>;

#[derive(Clone)]
pub struct OpDescriptor {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub handler: Handler,
}

impl OpDescriptor {
    /// JSON-schema-shaped input description, used by tool discovery.
    pub fn input_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

pub struct OperationRegistry {
    ops: BTreeMap<&'static str, OpDescriptor>,
}

impl OperationRegistry {
    pub fn with_builtin_operations() -> Self {
        let mut ops = BTreeMap::new();
        for descriptor in crate::handlers::all_descriptors() {
            let replaced = ops.insert(descriptor.name, descriptor);
            debug_assert!(replaced.is_none(), "duplicate operation name");
        }
        Self { ops }
    }

    pub fn get(&self, name: &str) -> Option<&OpDescriptor> {
        self.ops.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OpDescriptor> {
        self.ops.values()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Runs one operation and renders the stamped response. Handler errors
    /// (and panics) become error payloads; they never escape the dispatcher.
    pub fn dispatch(&self, ctx: &ServerContext, name: &str, args: &Value) -> Value {
        debug!(operation = name, "dispatching");
        let outcome = self.dispatch_inner(ctx, name, args);
        match outcome {
            Ok(result) => json!({ "ok": true, "result": result }),
            Err(err) => {
                warn!(operation = name, kind = err.kind(), error = %err, "operation failed");
                json!({ "ok": false, "error": err.to_payload() })
            }
        }
    }

    fn dispatch_inner(&self, ctx: &ServerContext, name: &str, args: &Value) -> OpResult<Value> {
        let descriptor = self.ops.get(name).ok_or_else(|| {
            OpError::bad_request(format!("unknown operation {name}"))
        })?;
        let params = Params::new(args)?;
        let handler = descriptor.handler;
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, &params))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                Err(OpError::internal(message))
            }
        }
    }
}

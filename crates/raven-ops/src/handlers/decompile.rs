//! Decompilation operations.

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "decompile-class",
            category: "decompile",
            description: "Decompile a class to Java-like source",
            params: vec![
                ParamSpec::required("class", "string", "Class name to decompile"),
                ParamSpec::optional(
                    "decompiler",
                    "string",
                    "Backend name (case-insensitive); configured default otherwise",
                ),
            ],
            handler: decompile_class,
        },
        OpDescriptor {
            name: "decompiler-list",
            category: "decompile",
            description: "List registered decompiler backends",
            params: vec![],
            handler: decompiler_list,
        },
    ]
}

fn decompile_class(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let source = ctx.decompile(&session, &found, params.optional_str("decompiler")?)?;
    Ok(json!({
        "class": found.class.name,
        "lines": source.lines().count(),
        "source": source.as_str(),
    }))
}

fn decompiler_list(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let (default, names) = ctx.decompiler_names();
    Ok(json!({
        "default": default,
        "available": names,
    }))
}

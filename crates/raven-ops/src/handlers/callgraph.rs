//! Call-graph operations.

use serde_json::{json, Value};

use raven_graph::MethodId;

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

const DEFAULT_MAX_DEPTH: usize = 20;
const MAX_DEPTH_CAP: usize = 100;

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "callgraph-build",
            category: "callgraph",
            description: "Build (or rebuild) the call graph for the current revision",
            params: vec![],
            handler: build,
        },
        OpDescriptor {
            name: "callgraph-callers",
            category: "callgraph",
            description: "Methods that directly invoke the given method",
            params: vec![
                ParamSpec::required("class", "string", "Owner class of the method"),
                ParamSpec::required("name", "string", "Method name"),
                ParamSpec::required("descriptor", "string", "Method descriptor"),
            ],
            handler: callers,
        },
        OpDescriptor {
            name: "callgraph-callees",
            category: "callgraph",
            description: "Methods the given method directly invokes",
            params: vec![
                ParamSpec::required("class", "string", "Owner class of the method"),
                ParamSpec::required("name", "string", "Method name"),
                ParamSpec::required("descriptor", "string", "Method descriptor"),
            ],
            handler: callees,
        },
        OpDescriptor {
            name: "callgraph-path",
            category: "callgraph",
            description: "Shortest invocation path between two methods (callee direction)",
            params: vec![
                ParamSpec::required("from-class", "string", "Source method owner"),
                ParamSpec::required("from-name", "string", "Source method name"),
                ParamSpec::required("from-descriptor", "string", "Source method descriptor"),
                ParamSpec::required("to-class", "string", "Target method owner"),
                ParamSpec::required("to-name", "string", "Target method name"),
                ParamSpec::required("to-descriptor", "string", "Target method descriptor"),
                ParamSpec::with_default("max-depth", "int", "Edge budget, capped at 100", "20"),
            ],
            handler: path,
        },
    ]
}

fn build(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let graph = session.callgraph.build(&session.workspace, &ctx.analyses(&session));
    Ok(json!({
        "vertices": graph.vertex_count(),
        "edges": graph.edge_count(),
        "revision": session.workspace.revision(),
    }))
}

fn method_id(ctx: &ServerContext, params: &Params<'_>, prefix: &str) -> OpResult<MethodId> {
    let key = |suffix: &str| -> String {
        if prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{prefix}-{suffix}")
        }
    };
    let session = ctx.session()?;
    let class = params.required_str(&key("class"))?;
    // Resolve through the normal path so dotted names and simple names work;
    // external method owners are allowed to pass through unresolved.
    let owner = match ctx.resolve_class(&session, class) {
        Ok(found) => found.class.name,
        Err(_) => raven_workspace::normalize_class_name(class),
    };
    Ok(MethodId::new(
        &owner,
        params.required_str(&key("name"))?,
        params.required_str(&key("descriptor"))?,
    ))
}

fn adjacency_json(ids: &[MethodId]) -> Vec<Value> {
    ids.iter()
        .map(|id| {
            json!({
                "class": id.owner,
                "name": id.name,
                "descriptor": id.descriptor,
            })
        })
        .collect()
}

fn callers(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let graph = session.callgraph.get(&session.workspace)?;
    let id = method_id(ctx, params, "")?;
    let callers = graph.callers(&id);
    Ok(json!({
        "method": id.to_string(),
        "count": callers.len(),
        "callers": adjacency_json(&callers),
    }))
}

fn callees(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let graph = session.callgraph.get(&session.workspace)?;
    let id = method_id(ctx, params, "")?;
    let callees = graph.callees(&id);
    Ok(json!({
        "method": id.to_string(),
        "count": callees.len(),
        "callees": adjacency_json(&callees),
    }))
}

fn path(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let graph = session.callgraph.get(&session.workspace)?;
    let source = method_id(ctx, params, "from")?;
    let target = method_id(ctx, params, "to")?;
    let max_depth = params
        .optional_usize("max-depth", DEFAULT_MAX_DEPTH)?
        .min(MAX_DEPTH_CAP);

    let search = graph.find_path(&source, &target, max_depth);
    Ok(json!({
        "found": search.found,
        "length": search.path.len(),
        "path": adjacency_json(&search.path),
    }))
}

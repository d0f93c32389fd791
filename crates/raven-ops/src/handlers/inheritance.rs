//! Inheritance operations.

use serde_json::{json, Value};

use raven_graph::{common_ancestor, supertypes};

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "supertypes",
            category: "inheritance",
            description: "Supertype chain: superclasses and interfaces until root or external",
            params: vec![ParamSpec::required("class", "string", "Class to walk upward from")],
            handler: supertypes_op,
        },
        OpDescriptor {
            name: "subtypes",
            category: "inheritance",
            description: "Direct or transitive subtypes from the loaded corpus",
            params: vec![
                ParamSpec::required("class", "string", "Class to walk downward from"),
                ParamSpec::with_default("direct-only", "bool", "Only direct subtypes", "false"),
            ],
            handler: subtypes_op,
        },
        OpDescriptor {
            name: "common-ancestor",
            category: "inheritance",
            description: "Lowest common ancestor of two classes",
            params: vec![
                ParamSpec::required("class-a", "string", "First class"),
                ParamSpec::required("class-b", "string", "Second class"),
            ],
            handler: common_ancestor_op,
        },
    ]
}

fn supertypes_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let chain = supertypes(&session.workspace, &found.class.name);
    let external: Vec<&String> = chain
        .iter()
        .filter(|name| session.workspace.lookup_class(name).is_none())
        .collect();
    Ok(json!({
        "class": found.class.name,
        "supertypes": chain,
        "external": external,
    }))
}

fn subtypes_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let index = session.inheritance.subtype_index(&session.workspace);
    let subtypes = if params.optional_bool("direct-only", false)? {
        index.direct_subtypes(&found.class.name)
    } else {
        index.all_subtypes(&found.class.name)
    };
    Ok(json!({
        "class": found.class.name,
        "count": subtypes.len(),
        "subtypes": subtypes,
    }))
}

fn common_ancestor_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let a = ctx.resolve_class(&session, params.required_str("class-a")?)?;
    let b = ctx.resolve_class(&session, params.required_str("class-b")?)?;
    let ancestor = common_ancestor(&session.workspace, &a.class.name, &b.class.name);
    Ok(json!({
        "class-a": a.class.name,
        "class-b": b.class.name,
        "common-ancestor": ancestor,
    }))
}

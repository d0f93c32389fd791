//! Cross-reference operations.

use serde_json::{json, Value};

use raven_graph::{xrefs_from, xrefs_to};
use raven_search::{AnalysisProvider, Page, Paged, SearchOptions};

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::handlers::{page, scope};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "xrefs-to",
            category: "xrefs",
            description: "Find references to a class or one of its members",
            params: vec![
                ParamSpec::required("class", "string", "Referent class name"),
                ParamSpec::optional("name", "string", "Member name; class-level references otherwise"),
                ParamSpec::optional("descriptor", "string", "Member descriptor"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: xrefs_to_op,
        },
        OpDescriptor {
            name: "xrefs-to-count",
            category: "xrefs",
            description: "Count references to a class or member without materializing them",
            params: vec![
                ParamSpec::required("class", "string", "Referent class name"),
                ParamSpec::optional("name", "string", "Member name"),
                ParamSpec::optional("descriptor", "string", "Member descriptor"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
            ],
            handler: xrefs_to_count,
        },
        OpDescriptor {
            name: "xrefs-from",
            category: "xrefs",
            description: "Outgoing references of a class or one method",
            params: vec![
                ParamSpec::required("class", "string", "Referer class name"),
                ParamSpec::optional("method-name", "string", "Restrict to one method"),
                ParamSpec::optional("method-descriptor", "string", "Descriptor of the method"),
            ],
            handler: xrefs_from_op,
        },
    ]
}

fn collect_sites(
    ctx: &ServerContext,
    params: &Params<'_>,
) -> OpResult<Vec<raven_graph::XrefSite>> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let options = SearchOptions {
        scope: scope(params)?,
        cancel: None,
    };
    let sites = xrefs_to(
        &session.workspace,
        &ctx.analyses(&session),
        &found.class.name,
        params.optional_str("name")?,
        params.optional_str("descriptor")?,
        &options,
    )?;
    Ok(sites)
}

fn site_json(site: &raven_graph::XrefSite) -> Value {
    json!({
        "class": site.class_name,
        "method": {
            "name": site.method_name,
            "descriptor": site.method_descriptor,
        },
        "instruction": site.instruction_index,
        "text": site.text,
    })
}

fn xrefs_to_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let sites = collect_sites(ctx, params)?;
    let page: Page = page(params)?;
    let paged = Paged::slice(&sites, page);
    let items: Vec<Value> = paged.items.iter().map(site_json).collect();
    Ok(json!({
        "total": paged.total,
        "count": items.len(),
        "has-more": paged.has_more,
        "items": items,
    }))
}

fn xrefs_to_count(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let sites = collect_sites(ctx, params)?;
    Ok(json!({ "count": sites.len() }))
}

fn xrefs_from_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let analysis = ctx.analyses(&session).analysis(&found);

    let method_name = params.optional_str("method-name")?;
    let method_descriptor = params.optional_str("method-descriptor")?;
    let filter = match (method_name, method_descriptor) {
        (Some(name), Some(descriptor)) => Some((name, descriptor)),
        (Some(name), None) => {
            // Without a descriptor, a unique name is enough.
            let matching: Vec<&str> = analysis
                .methods
                .iter()
                .filter(|m| m.name == name)
                .map(|m| m.descriptor.as_str())
                .collect();
            match matching.as_slice() {
                [only] => Some((name, *only)),
                [] => {
                    return Err(crate::error::OpError::NotFound {
                        message: format!("method {name} not found in {}", found.class.name),
                        suggestions: analysis
                            .methods
                            .iter()
                            .map(|m| m.name.clone())
                            .take(5)
                            .collect(),
                    })
                }
                many => {
                    return Err(crate::error::OpError::Ambiguous {
                        message: format!(
                            "method {name} is overloaded in {}; pass method-descriptor",
                            found.class.name
                        ),
                        candidates: many.iter().map(|d| d.to_string()).collect(),
                    })
                }
            }
        }
        (None, _) => None,
    };

    let refs = xrefs_from(&analysis, filter);
    let methods: Vec<Value> = refs
        .method_refs
        .iter()
        .map(|site| {
            json!({
                "instruction": site.index,
                "kind": site.kind.as_str(),
                "owner": site.member.owner,
                "name": site.member.name,
                "descriptor": site.member.descriptor,
            })
        })
        .collect();
    let fields: Vec<Value> = refs
        .field_refs
        .iter()
        .map(|site| {
            json!({
                "instruction": site.index,
                "access": site.access.as_str(),
                "owner": site.member.owner,
                "name": site.member.name,
                "descriptor": site.member.descriptor,
            })
        })
        .collect();
    let invokedynamics: Vec<Value> = refs
        .invokedynamics
        .iter()
        .map(|site| {
            let args: Vec<String> = site.args.iter().map(|arg| arg.canonical_text()).collect();
            json!({
                "instruction": site.index,
                "call-name": site.name,
                "call-descriptor": site.descriptor,
                "bootstrap": {
                    "owner": site.bootstrap.owner,
                    "name": site.bootstrap.name,
                    "descriptor": site.bootstrap.descriptor,
                    "kind": site.bootstrap.kind,
                },
                "args": args,
            })
        })
        .collect();

    Ok(json!({
        "class": found.class.name,
        "method-refs": methods,
        "field-refs": fields,
        "invokedynamic": invokedynamics,
        "type-refs": refs.type_refs,
    }))
}

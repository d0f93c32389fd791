//! Navigation operations: listings, counts, and per-class detail.

use serde_json::{json, Value};

use raven_classfile::access::describe_class_access;
use raven_search::Paged;
use raven_workspace::ResourceScope;

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::handlers::{page, text_predicate};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "class-list",
            category: "navigation",
            description: "List JVM classes with member and instruction counts",
            params: vec![
                ParamSpec::optional("package", "string", "Restrict to a package prefix (slash or dot form)"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: class_list,
        },
        OpDescriptor {
            name: "package-list",
            category: "navigation",
            description: "List unique package prefixes, including (default) for the root package",
            params: vec![],
            handler: package_list,
        },
        OpDescriptor {
            name: "class-count",
            category: "navigation",
            description: "Count loaded classes, total and primary-resource-only",
            params: vec![],
            handler: class_count,
        },
        OpDescriptor {
            name: "class-info",
            category: "navigation",
            description: "Resolve a class and describe its members",
            params: vec![ParamSpec::required(
                "class",
                "string",
                "Class name: internal, dotted, or unique simple name",
            )],
            handler: class_info,
        },
        OpDescriptor {
            name: "class-search-by-name",
            category: "navigation",
            description: "Find classes whose name matches a pattern",
            params: vec![
                ParamSpec::required("value", "string", "Pattern to match against class names"),
                ParamSpec::with_default("match", "string", "Predicate mode", "contains-ignore-case"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: class_search_by_name,
        },
        OpDescriptor {
            name: "workspace-status",
            category: "navigation",
            description: "Describe the open workspace: resources, revision, cache sizes",
            params: vec![],
            handler: workspace_status,
        },
    ]
}

fn class_list(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let inventory = ctx.inventory(&session);
    let page = page(params)?;
    let package = params
        .optional_str("package")?
        .map(raven_workspace::normalize_class_name);

    let summaries: Vec<&raven_workspace::ClassSummary> = inventory
        .classes
        .iter()
        .filter(|summary| match &package {
            Some(prefix) => {
                let class_package = summary
                    .name
                    .rsplit_once('/')
                    .map_or("", |(package, _)| package);
                class_package == prefix || class_package.starts_with(&format!("{prefix}/"))
            }
            None => true,
        })
        .collect();

    let paged = Paged::slice(&summaries, page);
    let items: Vec<Value> = paged
        .items
        .iter()
        .map(|summary| {
            json!({
                "name": summary.name,
                "super": summary.super_name,
                "access": describe_class_access(summary.access_flags),
                "fields": summary.field_count,
                "methods": summary.method_count,
                "instructions": summary.instruction_count,
            })
        })
        .collect();
    Ok(json!({
        "total": paged.total,
        "count": items.len(),
        "has-more": paged.has_more,
        "items": items,
    }))
}

fn package_list(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let inventory = ctx.inventory(&session);
    Ok(json!({
        "count": inventory.packages.len(),
        "packages": inventory.packages,
    }))
}

fn class_count(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    Ok(json!({
        "total": session.workspace.class_count(ResourceScope::All),
        "primary": session.workspace.class_count(ResourceScope::PrimaryOnly),
    }))
}

fn class_info(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let class = &found.class.class;

    let fields: Vec<Value> = class
        .fields
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "descriptor": field.descriptor,
                "access": field.access_flags,
                "constant-value": field.constant_value.as_ref().map(render_constant),
            })
        })
        .collect();
    let methods: Vec<Value> = class
        .methods
        .iter()
        .map(|method| {
            json!({
                "name": method.name,
                "descriptor": method.descriptor,
                "access": method.access_flags,
                "instructions": method.instruction_count(),
                "corrupt": method.corrupt,
            })
        })
        .collect();

    Ok(json!({
        "name": class.name,
        "super": class.super_name,
        "interfaces": class.interfaces,
        "access": describe_class_access(class.access_flags),
        "source-file": class.source_file,
        "resource": found.resource_name,
        "content-hash": format!("{:08x}", found.class.content_hash),
        "fields": fields,
        "methods": methods,
    }))
}

fn render_constant(constant: &raven_classfile::ConstantValue) -> String {
    use raven_classfile::ConstantValue;
    match constant {
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Long(v) => format!("{v}L"),
        ConstantValue::Float(v) => format!("{v}F"),
        ConstantValue::Double(v) => format!("{v}D"),
        ConstantValue::Str(s) => format!("{s:?}"),
    }
}

fn class_search_by_name(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let inventory = ctx.inventory(&session);
    let page = page(params)?;
    let predicate = text_predicate(
        params.optional_str("match")?.or(Some("contains-ignore-case")),
        params.required_str("value")?,
        "value",
    )?;

    let names: Vec<&str> = inventory
        .class_names()
        .filter(|name| predicate.matches(name))
        .collect();
    let paged = Paged::slice(&names, page);
    Ok(json!({
        "total": paged.total,
        "count": paged.items.len(),
        "has-more": paged.has_more,
        "items": paged.items,
    }))
}

fn workspace_status(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let workspace = &session.workspace;
    let resources: Vec<Value> = workspace
        .resources()
        .iter()
        .enumerate()
        .map(|(index, resource)| {
            json!({
                "index": index,
                "name": resource.name(),
                "kind": if index == 0 { "primary" } else { "supporting" },
                "classes": resource.class_count(),
                "files": resource.files().len(),
            })
        })
        .collect();
    let caches: Vec<Value> = ctx
        .cache_sizes()
        .iter()
        .map(|(name, len)| json!({ "name": name, "entries": len }))
        .collect();
    Ok(json!({
        "identity": workspace.identity(),
        "revision": workspace.revision(),
        "resources": resources,
        "caches": caches,
        "comments": workspace.comments().len(),
        "mapping-batches": session.aggregate.batch_count(),
        "undo-available": session.transforms.has_undo(),
    }))
}

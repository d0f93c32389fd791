//! Workspace lifecycle and mutation operations.

use std::path::Path;

use serde_json::{json, Value};

use raven_workspace::{
    export_primary, CompressionMode, OutputType, Resource, ResourceKind, Workspace,
};

use crate::context::ServerContext;
use crate::error::{OpError, OpResult};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "workspace-open",
            category: "workspace",
            description: "Open a jar, directory, or class file as the primary resource",
            params: vec![ParamSpec::required("path", "string", "Artifact path")],
            handler: open,
        },
        OpDescriptor {
            name: "workspace-close",
            category: "workspace",
            description: "Close the current workspace; caches are swept",
            params: vec![],
            handler: close,
        },
        OpDescriptor {
            name: "workspace-add-supporting",
            category: "workspace",
            description: "Attach a supporting resource used for resolution",
            params: vec![ParamSpec::required("path", "string", "Artifact path")],
            handler: add_supporting,
        },
        OpDescriptor {
            name: "workspace-add-phantoms",
            category: "workspace",
            description: "Generate phantom stubs for referenced-but-missing types",
            params: vec![],
            handler: add_phantoms,
        },
        OpDescriptor {
            name: "workspace-export",
            category: "workspace",
            description: "Write the primary resource to disk",
            params: vec![
                ParamSpec::required("path", "string", "Output path"),
                ParamSpec::with_default("output-type", "string", "archive or directory", "archive"),
                ParamSpec::with_default(
                    "compression-mode",
                    "string",
                    "match-original, smart, always, or never",
                    "smart",
                ),
            ],
            handler: export,
        },
        OpDescriptor {
            name: "class-bytecode-replace",
            category: "workspace",
            description: "Replace a class's bytecode from a classfile on disk",
            params: vec![
                ParamSpec::required("class", "string", "Class to replace"),
                ParamSpec::required("path", "string", "Path to the new .class bytes"),
            ],
            handler: bytecode_replace,
        },
        OpDescriptor {
            name: "class-remove",
            category: "workspace",
            description: "Remove a class from the resource providing it",
            params: vec![ParamSpec::required("class", "string", "Class to remove")],
            handler: class_remove,
        },
    ]
}

fn open(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let path = params.required_str("path")?;
    let workspace = Workspace::open(Path::new(path))?;
    let session = ctx.open_workspace(workspace);
    Ok(json!({
        "identity": session.workspace.identity(),
        "classes": session.workspace.class_count(raven_workspace::ResourceScope::All),
        "revision": session.workspace.revision(),
    }))
}

fn close(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let closed = ctx.close_workspace();
    Ok(json!({ "closed": closed }))
}

fn add_supporting(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let path = params.required_str("path")?;
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let resource = Resource::from_path(name, ResourceKind::Supporting, Path::new(path))?;
    let classes = resource.class_count();
    session.workspace.add_supporting(resource);
    let revision = session.workspace.commit_mutation();
    Ok(json!({ "classes": classes, "revision": revision }))
}

fn add_phantoms(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let _ = params;
    let session = ctx.session()?;
    let resource = ctx
        .phantom_generator()
        .create_phantoms(&session.workspace)?;
    let classes = resource.class_count();
    session.workspace.add_supporting(resource);
    let revision = session.workspace.commit_mutation();
    Ok(json!({ "phantoms": classes, "revision": revision }))
}

fn export(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let path = params.required_str("path")?;
    let output = params.optional_str("output-type")?.unwrap_or("archive");
    let output = OutputType::parse(output).ok_or_else(|| {
        OpError::bad_parameter(
            "output-type",
            format!("unknown output type {output}; expected archive or directory"),
        )
    })?;
    let compression = params.optional_str("compression-mode")?.unwrap_or("smart");
    let compression = CompressionMode::parse(compression).ok_or_else(|| {
        OpError::bad_parameter(
            "compression-mode",
            format!(
                "unknown compression mode {compression}; expected match-original, smart, always, or never"
            ),
        )
    })?;

    export_primary(&session.workspace, Path::new(path), output, compression)?;
    Ok(json!({ "path": path }))
}

fn bytecode_replace(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let path = params.required_str("path")?;
    let bytes = std::fs::read(path).map_err(|err| {
        OpError::bad_parameter("path", format!("cannot read {path}: {err}"))
    })?;
    session.workspace.replace_class(&found.class.name, bytes)?;
    let revision = session.workspace.commit_mutation();
    Ok(json!({ "class": found.class.name, "revision": revision }))
}

fn class_remove(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    session.workspace.remove_class(&found.class.name)?;
    let revision = session.workspace.commit_mutation();
    Ok(json!({ "class": found.class.name, "revision": revision }))
}

//! Transform pipeline operations.

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "transform-apply",
            category: "transform",
            description: "Run registered transformers in order; snapshots for a single undo",
            params: vec![ParamSpec::required(
                "transformers",
                "string-list",
                "Names of registered transformers, applied in order",
            )],
            handler: apply,
        },
        OpDescriptor {
            name: "transform-undo",
            category: "transform",
            description: "Restore the pre-transform bytecode snapshot (one generation)",
            params: vec![],
            handler: undo,
        },
    ]
}

fn apply(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let names = params.required_str_list("transformers")?;
    let transformers: OpResult<Vec<_>> = names.iter().map(|name| ctx.transformer(name)).collect();
    let transformers = transformers?;
    let refs: Vec<&dyn raven_mapping::Transformer> =
        transformers.iter().map(|t| t.as_ref()).collect();

    let report = session
        .transforms
        .apply(&session.workspace, &refs, &session.aggregate)?;
    Ok(json!({
        "classes-updated": report.classes_updated,
        "classes-removed": report.classes_removed,
        "revision": report.revision,
    }))
}

fn undo(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let report = session.transforms.undo(&session.workspace)?;
    Ok(json!({
        "classes-restored": report.classes_updated,
        "revision": report.revision,
    }))
}

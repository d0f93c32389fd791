//! Assembler and compiler passthrough operations. The backends are
//! external; these operations adapt their results to the wire contract.

use serde_json::{json, Value};

use crate::context::ServerContext;
use crate::error::OpResult;
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "disassemble-class",
            category: "assemble",
            description: "Disassemble a class to assembler text",
            params: vec![ParamSpec::required("class", "string", "Class to disassemble")],
            handler: disassemble,
        },
        OpDescriptor {
            name: "assemble-class",
            category: "assemble",
            description: "Assemble classfile text and replace the class's bytecode",
            params: vec![
                ParamSpec::required("class", "string", "Class the source replaces"),
                ParamSpec::required("source", "string", "Assembler source text"),
            ],
            handler: assemble,
        },
        OpDescriptor {
            name: "compile-class",
            category: "compile",
            description: "Compile Java source and merge the resulting classes into the primary resource",
            params: vec![
                ParamSpec::required("class", "string", "Binary name of the class the source defines"),
                ParamSpec::required("source", "string", "Java source text"),
            ],
            handler: compile,
        },
    ]
}

fn disassemble(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let assembler = ctx.assembler()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let text = assembler.disassemble(&found.class)?;
    Ok(json!({
        "class": found.class.name,
        "text": text,
    }))
}

fn assemble(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let assembler = ctx.assembler()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let bytes = assembler.assemble(params.required_str("source")?, &session.workspace)?;
    session.workspace.replace_class(&found.class.name, bytes)?;
    let revision = session.workspace.commit_mutation();
    Ok(json!({
        "class": found.class.name,
        "revision": revision,
    }))
}

fn compile(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let compiler = ctx.compiler()?;
    let class_name =
        raven_workspace::normalize_class_name(params.required_str("class")?);
    let classes = compiler.compile(
        &class_name,
        params.required_str("source")?,
        &session.workspace,
    )?;

    // A compilation unit may produce nested classes; replace existing
    // entries and add new ones, then bump once for the whole batch.
    let mut replaced = Vec::new();
    let mut added = Vec::new();
    for (name, bytes) in classes {
        if session.workspace.lookup_class(&name).is_some() {
            session.workspace.replace_class(&name, bytes)?;
            replaced.push(name);
        } else {
            let loaded = raven_workspace::LoadedClass::parse(bytes).map_err(|source| {
                raven_workspace::WorkspaceError::MalformedClass {
                    name: name.clone(),
                    source,
                }
            })?;
            session.workspace.primary().insert_class(loaded)?;
            added.push(name);
        }
    }
    let revision = session.workspace.commit_mutation();
    Ok(json!({
        "replaced": replaced,
        "added": added,
        "revision": revision,
    }))
}

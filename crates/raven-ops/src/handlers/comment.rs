//! Session comments on classes and members. These annotate the analysis,
//! not the bytecode, so they bypass the mutation hook.

use serde_json::{json, Value};

use raven_workspace::CommentKey;

use crate::context::ServerContext;
use crate::error::{OpError, OpResult};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "comment-set",
            category: "comment",
            description: "Attach a note to a class or member; empty text clears it",
            params: vec![
                ParamSpec::required("class", "string", "Class the note belongs to"),
                ParamSpec::optional("member-name", "string", "Member name for a member note"),
                ParamSpec::optional("member-descriptor", "string", "Member descriptor"),
                ParamSpec::required("text", "string", "Note text; empty removes the note"),
            ],
            handler: set,
        },
        OpDescriptor {
            name: "comment-get",
            category: "comment",
            description: "Read the note on a class or member",
            params: vec![
                ParamSpec::required("class", "string", "Class the note belongs to"),
                ParamSpec::optional("member-name", "string", "Member name for a member note"),
                ParamSpec::optional("member-descriptor", "string", "Member descriptor"),
            ],
            handler: get,
        },
        OpDescriptor {
            name: "comment-list",
            category: "comment",
            description: "List notes, optionally for one class",
            params: vec![ParamSpec::optional("class", "string", "Restrict to one class")],
            handler: list,
        },
    ]
}

fn key_from(ctx: &ServerContext, params: &Params<'_>) -> OpResult<CommentKey> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let member = match (
        params.optional_str("member-name")?,
        params.optional_str("member-descriptor")?,
    ) {
        (Some(name), Some(descriptor)) => Some((name.to_string(), descriptor.to_string())),
        (Some(_), None) => {
            return Err(OpError::bad_parameter(
                "member-descriptor",
                "member-descriptor is required when member-name is given",
            ))
        }
        (None, _) => None,
    };
    Ok(CommentKey {
        class_name: found.class.name,
        member,
    })
}

fn set(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let key = key_from(ctx, params)?;
    let text = params.required_str("text")?;
    let session = ctx.session()?;
    session
        .workspace
        .comments()
        .set(key.clone(), text.to_string());
    Ok(json!({
        "class": key.class_name,
        "cleared": text.is_empty(),
    }))
}

fn get(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let key = key_from(ctx, params)?;
    let session = ctx.session()?;
    let text = session.workspace.comments().get(&key);
    Ok(json!({
        "class": key.class_name,
        "member": key.member.as_ref().map(|(name, descriptor)| {
            json!({ "name": name, "descriptor": descriptor })
        }),
        "text": text,
    }))
}

fn list(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let class = match params.optional_str("class")? {
        Some(query) => Some(ctx.resolve_class(&session, query)?.class.name),
        None => None,
    };
    let comments: Vec<Value> = session
        .workspace
        .comments()
        .list(class.as_deref())
        .into_iter()
        .map(|(key, text)| {
            json!({
                "class": key.class_name,
                "member": key.member.map(|(name, descriptor)| {
                    json!({ "name": name, "descriptor": descriptor })
                }),
                "text": text,
            })
        })
        .collect();
    Ok(json!({
        "count": comments.len(),
        "comments": comments,
    }))
}

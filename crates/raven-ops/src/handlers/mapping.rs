//! Rename and mapping operations.

use serde_json::{json, Map, Value};

use raven_mapping::{apply_to_primary, IntermediateMappings, MemberKey, VariableKey};
use raven_workspace::normalize_class_name;

use crate::context::ServerContext;
use crate::error::{OpError, OpResult};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "rename-class",
            category: "mapping",
            description: "Rename a class; declarations, references, and descriptors follow",
            params: vec![
                ParamSpec::required("class", "string", "Current class name"),
                ParamSpec::required("new-name", "string", "New internal (or dotted) name"),
            ],
            handler: rename_class,
        },
        OpDescriptor {
            name: "rename-field",
            category: "mapping",
            description: "Rename a field and every reference to it",
            params: vec![
                ParamSpec::required("class", "string", "Owner class"),
                ParamSpec::required("name", "string", "Current field name"),
                ParamSpec::required("descriptor", "string", "Field descriptor"),
                ParamSpec::required("new-name", "string", "New field name"),
            ],
            handler: rename_field,
        },
        OpDescriptor {
            name: "rename-method",
            category: "mapping",
            description: "Rename a method and every call site",
            params: vec![
                ParamSpec::required("class", "string", "Owner class"),
                ParamSpec::required("name", "string", "Current method name"),
                ParamSpec::required("descriptor", "string", "Method descriptor"),
                ParamSpec::required("new-name", "string", "New method name"),
            ],
            handler: rename_method,
        },
        OpDescriptor {
            name: "rename-variable",
            category: "mapping",
            description: "Rename a local variable (requires debug info)",
            params: vec![
                ParamSpec::required("class", "string", "Owner class"),
                ParamSpec::required("method-name", "string", "Method name"),
                ParamSpec::required("method-descriptor", "string", "Method descriptor"),
                ParamSpec::required("slot", "int", "Local variable slot"),
                ParamSpec::required("name", "string", "Current variable name"),
                ParamSpec::required("descriptor", "string", "Variable descriptor"),
                ParamSpec::required("new-name", "string", "New variable name"),
            ],
            handler: rename_variable,
        },
        OpDescriptor {
            name: "mapping-apply",
            category: "mapping",
            description: "Apply a batch of class/member/variable renames in one revision",
            params: vec![ParamSpec::required(
                "mappings",
                "object",
                "Batch: {classes: {old: new}, fields: [...], methods: [...], variables: [...]}",
            )],
            handler: mapping_apply,
        },
        OpDescriptor {
            name: "mapping-export",
            category: "mapping",
            description: "Export every mapping applied this session",
            params: vec![],
            handler: mapping_export,
        },
    ]
}

fn apply(ctx: &ServerContext, mappings: IntermediateMappings) -> OpResult<Value> {
    let session = ctx.session()?;
    let report = apply_to_primary(&session.workspace, &mappings, &session.aggregate)?;
    Ok(json!({
        "classes-changed": report.classes_changed,
        "revision": report.revision,
    }))
}

fn rename_class(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let new_name = normalize_class_name(params.required_str("new-name")?);
    if new_name.is_empty() {
        return Err(OpError::bad_parameter("new-name", "new name must not be empty"));
    }
    apply(
        ctx,
        IntermediateMappings::rename_class(&found.class.name, &new_name),
    )
}

fn rename_field(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let name = params.required_str("name")?;
    let descriptor = params.required_str("descriptor")?;
    if found.class.class.find_field(name, descriptor).is_none() {
        return Err(OpError::NotFound {
            message: format!("field {name} {descriptor} not found in {}", found.class.name),
            suggestions: found
                .class
                .class
                .fields
                .iter()
                .map(|f| f.name.clone())
                .take(5)
                .collect(),
        });
    }
    apply(
        ctx,
        IntermediateMappings::rename_field(
            &found.class.name,
            name,
            descriptor,
            params.required_str("new-name")?,
        ),
    )
}

fn rename_method(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let name = params.required_str("name")?;
    let descriptor = params.required_str("descriptor")?;
    if found.class.class.find_method(name, descriptor).is_none() {
        return Err(OpError::NotFound {
            message: format!(
                "method {name} {descriptor} not found in {}",
                found.class.name
            ),
            suggestions: found
                .class
                .class
                .methods
                .iter()
                .map(|m| m.name.clone())
                .take(5)
                .collect(),
        });
    }
    apply(
        ctx,
        IntermediateMappings::rename_method(
            &found.class.name,
            name,
            descriptor,
            params.required_str("new-name")?,
        ),
    )
}

fn rename_variable(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let found = ctx.resolve_class(&session, params.required_str("class")?)?;
    let mut mappings = IntermediateMappings::default();
    mappings.variables.insert(
        VariableKey {
            owner: found.class.name.clone(),
            method_name: params.required_str("method-name")?.to_string(),
            method_descriptor: params.required_str("method-descriptor")?.to_string(),
            slot: params.required_u16("slot")?,
            name: params.required_str("name")?.to_string(),
            descriptor: params.required_str("descriptor")?.to_string(),
        },
        params.required_str("new-name")?.to_string(),
    );
    apply(ctx, mappings)
}

fn mapping_apply(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let spec = params
        .optional_object("mappings")?
        .ok_or_else(|| OpError::bad_parameter("mappings", "missing required parameter mappings"))?;
    apply(ctx, parse_mappings(spec)?)
}

fn parse_mappings(spec: &Map<String, Value>) -> OpResult<IntermediateMappings> {
    let mut mappings = IntermediateMappings::default();

    if let Some(classes) = spec.get("classes") {
        let classes = classes.as_object().ok_or_else(|| {
            OpError::bad_parameter("mappings", "classes must be an object of old: new names")
        })?;
        for (old, new) in classes {
            let new = new.as_str().ok_or_else(|| {
                OpError::bad_parameter("mappings", format!("class target for {old} must be a string"))
            })?;
            mappings
                .classes
                .insert(normalize_class_name(old), normalize_class_name(new));
        }
    }

    for (section, is_field) in [("fields", true), ("methods", false)] {
        let Some(entries) = spec.get(section) else {
            continue;
        };
        let entries = entries.as_array().ok_or_else(|| {
            OpError::bad_parameter("mappings", format!("{section} must be a list"))
        })?;
        for entry in entries {
            let entry = entry.as_object().ok_or_else(|| {
                OpError::bad_parameter("mappings", format!("{section} entries must be objects"))
            })?;
            let field = |key: &str| -> OpResult<String> {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        OpError::bad_parameter(
                            "mappings",
                            format!("{section} entries require a string {key}"),
                        )
                    })
            };
            let key = MemberKey {
                owner: normalize_class_name(&field("owner")?),
                name: field("name")?,
                descriptor: field("descriptor")?,
            };
            let target = field("new-name")?;
            if is_field {
                mappings.fields.insert(key, target);
            } else {
                mappings.methods.insert(key, target);
            }
        }
    }

    if let Some(entries) = spec.get("variables") {
        let entries = entries.as_array().ok_or_else(|| {
            OpError::bad_parameter("mappings", "variables must be a list")
        })?;
        for entry in entries {
            let entry = entry.as_object().ok_or_else(|| {
                OpError::bad_parameter("mappings", "variables entries must be objects")
            })?;
            let text = |key: &str| -> OpResult<String> {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        OpError::bad_parameter(
                            "mappings",
                            format!("variables entries require a string {key}"),
                        )
                    })
            };
            let slot = entry
                .get("slot")
                .and_then(Value::as_u64)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| {
                    OpError::bad_parameter("mappings", "variables entries require a slot")
                })?;
            mappings.variables.insert(
                VariableKey {
                    owner: normalize_class_name(&text("owner")?),
                    method_name: text("method-name")?,
                    method_descriptor: text("method-descriptor")?,
                    slot,
                    name: text("name")?,
                    descriptor: text("descriptor")?,
                },
                text("new-name")?,
            );
        }
    }

    Ok(mappings)
}

fn mapping_export(ctx: &ServerContext, _params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let merged = session.aggregate.merged();

    let classes: Map<String, Value> = merged
        .classes
        .iter()
        .map(|(old, new)| (old.clone(), json!(new)))
        .collect();
    let member_json = |key: &MemberKey, new_name: &String| {
        json!({
            "owner": key.owner,
            "name": key.name,
            "descriptor": key.descriptor,
            "new-name": new_name,
        })
    };
    let fields: Vec<Value> = merged
        .fields
        .iter()
        .map(|(key, new)| member_json(key, new))
        .collect();
    let methods: Vec<Value> = merged
        .methods
        .iter()
        .map(|(key, new)| member_json(key, new))
        .collect();
    let variables: Vec<Value> = merged
        .variables
        .iter()
        .map(|(key, new)| {
            json!({
                "owner": key.owner,
                "method-name": key.method_name,
                "method-descriptor": key.method_descriptor,
                "slot": key.slot,
                "name": key.name,
                "descriptor": key.descriptor,
                "new-name": new,
            })
        })
        .collect();

    Ok(json!({
        "batches": session.aggregate.batch_count(),
        "classes": classes,
        "fields": fields,
        "methods": methods,
        "variables": variables,
    }))
}

//! Search operations: one per query kind, plus decompiled-text search.

use serde_json::{json, Value};

use raven_search::{
    search_decompiled, NumberPredicate, Query, TextPredicate, DEFAULT_CLASS_CAP, MAX_CLASS_CAP,
};
use raven_workspace::normalize_class_name;

use crate::context::ServerContext;
use crate::error::{OpError, OpResult};
use crate::handlers::{page, paged_results, scope, text_predicate};
use crate::params::Params;
use crate::registry::{OpDescriptor, ParamSpec};

pub(crate) fn descriptors() -> Vec<OpDescriptor> {
    vec![
        OpDescriptor {
            name: "search-strings",
            category: "search",
            description: "Search string constants in bytecode",
            params: vec![
                ParamSpec::required("value", "string", "Text to match"),
                ParamSpec::with_default("match", "string", "Predicate mode", "contains"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_strings,
        },
        OpDescriptor {
            name: "search-numbers",
            category: "search",
            description: "Search numeric constants, including small push opcodes",
            params: vec![
                ParamSpec::required("value", "number", "Number to match"),
                ParamSpec::with_default("mode", "string", "One of eq, ge, le", "eq"),
                ParamSpec::optional("upper", "number", "Upper bound for between searches"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_numbers,
        },
        OpDescriptor {
            name: "search-references",
            category: "search",
            description: "Search member references (method, field, invokedynamic bootstrap)",
            params: vec![
                ParamSpec::optional("owner", "string", "Owner class predicate value"),
                ParamSpec::optional("name", "string", "Member name predicate value"),
                ParamSpec::optional("descriptor", "string", "Descriptor predicate value"),
                ParamSpec::with_default("match", "string", "Predicate mode applied to the given fields", "equals"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_references,
        },
        OpDescriptor {
            name: "search-declarations",
            category: "search",
            description: "Search declarations of classes, methods, and fields",
            params: vec![
                ParamSpec::optional("owner", "string", "Declaring class predicate value"),
                ParamSpec::optional("name", "string", "Member name predicate value"),
                ParamSpec::optional("descriptor", "string", "Descriptor predicate value"),
                ParamSpec::with_default("match", "string", "Predicate mode applied to the given fields", "equals"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_declarations,
        },
        OpDescriptor {
            name: "search-instructions",
            category: "search",
            description: "Sliding-window regex search over canonical instruction text",
            params: vec![
                ParamSpec::required(
                    "patterns",
                    "string-list",
                    "One regex per consecutive instruction; overlapping matches are reported",
                ),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_instructions,
        },
        OpDescriptor {
            name: "search-files",
            category: "search",
            description: "Search non-class files by name and text content",
            params: vec![
                ParamSpec::required("value", "string", "Text to match"),
                ParamSpec::with_default("match", "string", "Predicate mode", "contains"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "false"),
                ParamSpec::with_default("offset", "int", "First result index", "0"),
                ParamSpec::with_default("limit", "int", "Page size, capped at 1000", "100"),
            ],
            handler: search_files,
        },
        OpDescriptor {
            name: "search-decompiled",
            category: "search",
            description: "Regex search over decompiled source, line by line",
            params: vec![
                ParamSpec::required("pattern", "string", "Regex applied per source line"),
                ParamSpec::optional("package", "string", "Restrict to a package prefix"),
                ParamSpec::with_default("primary-only", "bool", "Restrict to the primary resource", "true"),
                ParamSpec::with_default("max-classes", "int", "Class scan cap (max 500)", "50"),
                ParamSpec::optional("decompiler", "string", "Backend name override"),
            ],
            handler: search_decompiled_op,
        },
    ]
}

fn run_paged(
    ctx: &ServerContext,
    params: &Params<'_>,
    tool: &str,
    query: Query,
) -> OpResult<Value> {
    let session = ctx.session()?;
    let page = page(params)?;
    let scope = scope(params)?;
    let results = ctx.cached_query(&session, tool, &query, scope)?;
    Ok(paged_results(&results, page))
}

fn search_strings(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let predicate = text_predicate(
        params.optional_str("match")?,
        params.required_str("value")?,
        "value",
    )?;
    run_paged(ctx, params, "search-strings", Query::Strings(predicate))
}

fn search_numbers(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let value = params.required_f64("value")?;
    let predicate = match params.optional_str("mode")?.unwrap_or("eq") {
        "eq" => NumberPredicate::Equals(value),
        "ge" => NumberPredicate::AtLeast(value),
        "le" => NumberPredicate::AtMost(value),
        "between" => NumberPredicate::Between(value, params.required_f64("upper")?),
        other => {
            return Err(OpError::bad_parameter(
                "mode",
                format!("unknown number mode {other}; expected eq, ge, le, or between"),
            ))
        }
    };
    run_paged(ctx, params, "search-numbers", Query::Numbers(predicate))
}

fn member_predicates(
    params: &Params<'_>,
) -> OpResult<(
    Option<TextPredicate>,
    Option<TextPredicate>,
    Option<TextPredicate>,
)> {
    let mode = params.optional_str("match")?.or(Some("equals"));
    let build = |key: &str| -> OpResult<Option<TextPredicate>> {
        params
            .optional_str(key)?
            .map(|value| text_predicate(mode, value, key))
            .transpose()
    };
    Ok((build("owner")?, build("name")?, build("descriptor")?))
}

fn search_references(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let (owner, name, descriptor) = member_predicates(params)?;
    run_paged(
        ctx,
        params,
        "search-references",
        Query::References {
            owner,
            name,
            descriptor,
        },
    )
}

fn search_declarations(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let (owner, name, descriptor) = member_predicates(params)?;
    run_paged(
        ctx,
        params,
        "search-declarations",
        Query::Declarations {
            owner,
            name,
            descriptor,
        },
    )
}

fn search_instructions(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let raw = params.required_str_list("patterns")?;
    if raw.is_empty() {
        return Err(OpError::bad_parameter(
            "patterns",
            "at least one instruction pattern is required",
        ));
    }
    let patterns: OpResult<Vec<TextPredicate>> = raw
        .iter()
        .map(|pattern| {
            TextPredicate::regex_partial(pattern).map_err(|err| {
                OpError::bad_parameter("patterns", format!("invalid regex {pattern:?}: {err}"))
            })
        })
        .collect();
    run_paged(
        ctx,
        params,
        "search-instructions",
        Query::Instructions(patterns?),
    )
}

fn search_files(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let predicate = text_predicate(
        params.optional_str("match")?,
        params.required_str("value")?,
        "value",
    )?;
    run_paged(ctx, params, "search-files", Query::Files(predicate))
}

fn search_decompiled_op(ctx: &ServerContext, params: &Params<'_>) -> OpResult<Value> {
    let session = ctx.session()?;
    let pattern = regex::Regex::new(params.required_str("pattern")?)
        .map_err(|err| OpError::bad_parameter("pattern", format!("invalid regex: {err}")))?;
    let package = params.optional_str("package")?.map(normalize_class_name);
    let cap = params
        .optional_usize("max-classes", DEFAULT_CLASS_CAP)?
        .min(MAX_CLASS_CAP);
    let decompiler = params.optional_str("decompiler")?;
    let scope = if params.optional_bool("primary-only", true)? {
        raven_workspace::ResourceScope::PrimaryOnly
    } else {
        raven_workspace::ResourceScope::All
    };

    let classes: Vec<_> = session
        .workspace
        .snapshot_classes(scope)
        .into_iter()
        .filter(|class_ref| match &package {
            Some(prefix) => class_ref.class.name.starts_with(&format!("{prefix}/")),
            None => true,
        })
        .collect();

    let decompile = |class_ref: &raven_workspace::ClassRef| -> Result<String, String> {
        ctx.decompile(&session, class_ref, decompiler)
            .map(|source| source.as_str().to_string())
            .map_err(|err| err.to_string())
    };
    let outcome = search_decompiled(&classes, &decompile, &pattern, cap, None)?;

    let matches: Vec<Value> = outcome
        .matches
        .iter()
        .map(|m| {
            json!({
                "class": m.class_name,
                "line": m.line_number,
                "text": m.text,
            })
        })
        .collect();
    Ok(json!({
        "count": matches.len(),
        "scanned-classes": classes.len().min(cap.max(1)),
        "skipped-classes": outcome.skipped_classes,
        "matches": matches,
    }))
}

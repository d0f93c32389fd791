//! Operation handlers, grouped by category, plus the shaping helpers they
//! share.

mod assemble;
mod callgraph;
mod comment;
mod decompile;
mod inheritance;
mod mapping;
mod navigation;
mod search;
mod transform;
mod workspace;
mod xrefs;

use serde_json::{json, Value};

use raven_search::{
    Page, Paged, ResultDetail, SearchResult, TextPredicate, MAX_LIMIT,
};
use raven_workspace::ResourceScope;

use crate::error::{OpError, OpResult};
use crate::params::Params;
use crate::registry::OpDescriptor;

pub(crate) fn all_descriptors() -> Vec<OpDescriptor> {
    let mut ops = Vec::new();
    ops.extend(navigation::descriptors());
    ops.extend(decompile::descriptors());
    ops.extend(search::descriptors());
    ops.extend(xrefs::descriptors());
    ops.extend(callgraph::descriptors());
    ops.extend(inheritance::descriptors());
    ops.extend(mapping::descriptors());
    ops.extend(workspace::descriptors());
    ops.extend(assemble::descriptors());
    ops.extend(comment::descriptors());
    ops.extend(transform::descriptors());
    ops
}

/// Extracts `(offset, limit)` with the documented defaults and clamping.
pub(crate) fn page(params: &Params<'_>) -> OpResult<Page> {
    let offset = params.optional_usize("offset", 0)?;
    let limit = params.optional_usize("limit", raven_search::DEFAULT_LIMIT)?;
    Ok(Page::clamped(offset, limit.min(MAX_LIMIT)))
}

/// `primary-only` flag mapped to a resource scope.
pub(crate) fn scope(params: &Params<'_>) -> OpResult<ResourceScope> {
    Ok(if params.optional_bool("primary-only", false)? {
        ResourceScope::PrimaryOnly
    } else {
        ResourceScope::All
    })
}

/// Builds a text predicate from a `match` mode (default `contains`) and a
/// value; regex modes surface compile failures as `bad-request` naming the
/// value parameter.
pub(crate) fn text_predicate(
    mode: Option<&str>,
    value: &str,
    value_param: &str,
) -> OpResult<TextPredicate> {
    let mode = mode.unwrap_or("contains");
    match mode {
        "equals" => Ok(TextPredicate::Equals(value.to_string())),
        "contains" => Ok(TextPredicate::Contains(value.to_string())),
        "contains-ignore-case" => Ok(TextPredicate::ContainsIgnoreCase(value.to_string())),
        "prefix" => Ok(TextPredicate::Prefix(value.to_string())),
        "suffix" => Ok(TextPredicate::Suffix(value.to_string())),
        "regex-partial" => TextPredicate::regex_partial(value)
            .map_err(|err| OpError::bad_parameter(value_param, format!("invalid regex: {err}"))),
        "regex-full" => TextPredicate::regex_full(value)
            .map_err(|err| OpError::bad_parameter(value_param, format!("invalid regex: {err}"))),
        "anything" => Ok(TextPredicate::Anything),
        other => Err(OpError::bad_parameter(
            "match",
            format!(
                "unknown match mode {other}; expected one of equals, contains, \
                 contains-ignore-case, prefix, suffix, regex-partial, regex-full, anything"
            ),
        )),
    }
}

pub(crate) fn result_to_json(result: &SearchResult) -> Value {
    let mut out = json!({});
    let map = out.as_object_mut().expect("object");
    if let Some((_, resource)) = result.path.resource() {
        map.insert("resource".to_string(), json!(resource));
    }
    if let Some(class) = result.path.class_name() {
        map.insert("class".to_string(), json!(class));
    }
    if let Some((kind, name, descriptor)) = result.path.member() {
        map.insert(
            "member".to_string(),
            json!({
                "kind": kind.as_str(),
                "name": name,
                "descriptor": descriptor,
            }),
        );
    }
    if let Some(index) = result.path.instruction_index() {
        map.insert("instruction".to_string(), json!(index));
    }
    let detail = match &result.detail {
        ResultDetail::StringConst { value } => json!({ "string": value }),
        ResultDetail::NumberConst { value } => json!({ "number": value }),
        ResultDetail::Reference { text } => json!({ "reference": text }),
        ResultDetail::Declaration { text } => json!({ "declaration": text }),
        ResultDetail::InstructionWindow { texts } => json!({ "instructions": texts }),
        ResultDetail::File { name, snippet } => json!({ "file": name, "snippet": snippet }),
    };
    map.insert("detail".to_string(), detail);
    out
}

/// Standard paged envelope: `{total, count, has-more, items}`.
pub(crate) fn paged_results(results: &[SearchResult], page: Page) -> Value {
    let paged = Paged::slice(results, page);
    let items: Vec<Value> = paged.items.iter().map(result_to_json).collect();
    json!({
        "total": paged.total,
        "count": items.len(),
        "has-more": paged.has_more,
        "items": items,
    })
}

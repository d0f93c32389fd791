//! Cross-references.
//!
//! Incoming references (`xrefs_to`) ride on the search engine: an equality
//! reference query shaped into `{class, member, instruction index}` triples.
//! Outgoing references (`xrefs_from`) read the cached class analysis
//! directly, optionally narrowed to one method.

use raven_analysis::{ClassAnalysis, FieldRefSite, InvokeDynamicSite, MethodRefSite};
use raven_search::{
    run_query, AnalysisProvider, Query, SearchError, SearchOptions, TextPredicate,
};
use raven_workspace::Workspace;

/// One incoming reference site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefSite {
    pub class_name: String,
    pub method_name: String,
    pub method_descriptor: String,
    pub instruction_index: usize,
    /// Canonical text of the referencing instruction.
    pub text: String,
}

/// Finds every reference to `owner` (optionally narrowed to a member
/// name/descriptor) across the workspace.
pub fn xrefs_to(
    workspace: &Workspace,
    provider: &dyn AnalysisProvider,
    owner: &str,
    name: Option<&str>,
    descriptor: Option<&str>,
    options: &SearchOptions,
) -> Result<Vec<XrefSite>, SearchError> {
    let query = Query::References {
        owner: Some(TextPredicate::Equals(owner.to_string())),
        name: name.map(|n| TextPredicate::Equals(n.to_string())),
        descriptor: descriptor.map(|d| TextPredicate::Equals(d.to_string())),
    };
    let results = run_query(workspace, provider, &query, options)?;
    Ok(results
        .into_iter()
        .filter_map(|result| {
            let class_name = result.path.class_name()?.to_string();
            let (_, method_name, method_descriptor) = result.path.member()?;
            let instruction_index = result.path.instruction_index()?;
            let text = match result.detail {
                raven_search::ResultDetail::Reference { text } => text,
                _ => String::new(),
            };
            Some(XrefSite {
                class_name,
                method_name: method_name.to_string(),
                method_descriptor: method_descriptor.to_string(),
                instruction_index,
                text,
            })
        })
        .collect())
}

/// Outgoing references of a class (or a single method of it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingRefs {
    pub method_refs: Vec<MethodRefSite>,
    pub field_refs: Vec<FieldRefSite>,
    /// Reported with the full bootstrap decode: handle, static arguments,
    /// and the call-site name/descriptor.
    pub invokedynamics: Vec<InvokeDynamicSite>,
    pub type_refs: Vec<String>,
}

pub fn xrefs_from(
    analysis: &ClassAnalysis,
    method: Option<(&str, &str)>,
) -> OutgoingRefs {
    let mut out = OutgoingRefs::default();
    let mut types = std::collections::BTreeSet::new();
    for m in &analysis.methods {
        if let Some((name, descriptor)) = method {
            if m.name != name || m.descriptor != descriptor {
                continue;
            }
        }
        out.method_refs.extend(m.method_refs.iter().cloned());
        out.field_refs.extend(m.field_refs.iter().cloned());
        out.invokedynamics.extend(m.invokedynamics.iter().cloned());
        types.extend(m.type_refs.iter().cloned());
    }
    out.type_refs = types.into_iter().collect();
    out
}

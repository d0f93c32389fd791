//! Query execution: parallel per-class traversal with deterministic result
//! ordering.
//!
//! Classes are snapshotted in workspace order (resource order, then class
//! name) and visited one rayon task per class; rayon's ordered collect keeps
//! the global result order stable at (resource order, class name, member
//! declaration order, instruction index). Workers poll the cancellation flag
//! at class boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use raven_analysis::ClassAnalysis;
use raven_classfile::{ConstantValue, MemberKind};
use raven_workspace::{ClassRef, ResourceScope, Workspace};

use crate::path::{PathBuilder, PathChain};
use crate::predicate::{NumberPredicate, TextPredicate};
use crate::query::Query;
use crate::SearchError;

/// Supplies (usually cached) analyses to the engine.
pub trait AnalysisProvider: Sync {
    fn analysis(&self, class: &ClassRef) -> Arc<ClassAnalysis>;
}

/// Direct provider that analyzes on every call; callers wanting caching wrap
/// their cache instead.
pub struct AnalyzeDirect;

impl AnalysisProvider for AnalyzeDirect {
    fn analysis(&self, class: &ClassRef) -> Arc<ClassAnalysis> {
        Arc::new(ClassAnalysis::analyze(&class.class.class))
    }
}

#[derive(Default, Clone)]
pub struct SearchOptions {
    pub scope: ResourceScope,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub path: PathChain,
    pub detail: ResultDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultDetail {
    StringConst { value: String },
    NumberConst { value: String },
    Reference { text: String },
    Declaration { text: String },
    InstructionWindow { texts: Vec<String> },
    File { name: String, snippet: Option<String> },
}

/// Runs `query` over the workspace and returns the full ordered result list;
/// pagination happens on the materialized list at the operation layer.
pub fn run_query(
    workspace: &Workspace,
    provider: &dyn AnalysisProvider,
    query: &Query,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    if let Query::Files(predicate) = query {
        return run_file_query(workspace, predicate, options);
    }

    let classes = workspace.snapshot_classes(options.scope);
    debug!(classes = classes.len(), query = %query.cache_token(), "running query");

    let per_class: Result<Vec<Vec<SearchResult>>, SearchError> = classes
        .par_iter()
        .map(|class_ref| {
            if options.cancelled() {
                return Err(SearchError::Cancelled);
            }
            let analysis = provider.analysis(class_ref);
            Ok(visit_class(workspace.identity(), class_ref, &analysis, query))
        })
        .collect();

    Ok(per_class?.into_iter().flatten().collect())
}

fn class_path(identity: u64, class_ref: &ClassRef) -> PathBuilder {
    PathBuilder::workspace(identity)
        .resource(class_ref.resource_index, &class_ref.resource_name)
        .bundle("jvm")
        .class(&class_ref.class.name)
}

fn visit_class(
    identity: u64,
    class_ref: &ClassRef,
    analysis: &ClassAnalysis,
    query: &Query,
) -> Vec<SearchResult> {
    match query {
        Query::Strings(predicate) => visit_strings(identity, class_ref, analysis, predicate),
        Query::Numbers(predicate) => visit_numbers(identity, class_ref, analysis, predicate),
        Query::References {
            owner,
            name,
            descriptor,
        } => visit_references(identity, class_ref, analysis, owner, name, descriptor),
        Query::Declarations {
            owner,
            name,
            descriptor,
        } => visit_declarations(identity, class_ref, owner, name, descriptor),
        Query::Instructions(patterns) => {
            visit_instruction_windows(identity, class_ref, analysis, patterns)
        }
        Query::Files(_) => Vec::new(),
    }
}

fn visit_strings(
    identity: u64,
    class_ref: &ClassRef,
    analysis: &ClassAnalysis,
    predicate: &TextPredicate,
) -> Vec<SearchResult> {
    let mut out = Vec::new();

    // Field ConstantValue strings come first: fields precede methods in
    // declaration order.
    for field in &class_ref.class.class.fields {
        if let Some(ConstantValue::Str(value)) = &field.constant_value {
            if predicate.matches(value) {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Field, &field.name, &field.descriptor)
                        .finish(),
                    detail: ResultDetail::StringConst {
                        value: value.clone(),
                    },
                });
            }
        }
    }

    for method in &analysis.methods {
        for (index, value) in &method.strings {
            if predicate.matches(value) {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Method, &method.name, &method.descriptor)
                        .instruction(*index)
                        .finish(),
                    detail: ResultDetail::StringConst {
                        value: value.clone(),
                    },
                });
            }
        }
    }
    out
}

fn constant_value_number(value: &ConstantValue) -> Option<(f64, String)> {
    match value {
        ConstantValue::Int(v) => Some((*v as f64, v.to_string())),
        ConstantValue::Long(v) => Some((*v as f64, format!("{v}L"))),
        ConstantValue::Float(v) => Some((*v as f64, format!("{v}F"))),
        ConstantValue::Double(v) => Some((*v, format!("{v}D"))),
        ConstantValue::Str(_) => None,
    }
}

fn visit_numbers(
    identity: u64,
    class_ref: &ClassRef,
    analysis: &ClassAnalysis,
    predicate: &NumberPredicate,
) -> Vec<SearchResult> {
    let mut out = Vec::new();

    for field in &class_ref.class.class.fields {
        if let Some(constant) = &field.constant_value {
            if let Some((value, rendered)) = constant_value_number(constant) {
                if predicate.matches(value) {
                    out.push(SearchResult {
                        path: class_path(identity, class_ref)
                            .member(MemberKind::Field, &field.name, &field.descriptor)
                            .finish(),
                        detail: ResultDetail::NumberConst { value: rendered },
                    });
                }
            }
        }
    }

    for method in &analysis.methods {
        for (index, number) in &method.numbers {
            let value = match number {
                raven_classfile::NumericConstant::Int(v) => *v as f64,
                raven_classfile::NumericConstant::Long(v) => *v as f64,
                raven_classfile::NumericConstant::Float(v) => *v as f64,
                raven_classfile::NumericConstant::Double(v) => *v,
            };
            if predicate.matches(value) {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Method, &method.name, &method.descriptor)
                        .instruction(*index)
                        .finish(),
                    detail: ResultDetail::NumberConst {
                        value: number.to_string(),
                    },
                });
            }
        }
    }
    out
}

fn matches_opt(predicate: &Option<TextPredicate>, text: &str) -> bool {
    predicate.as_ref().is_none_or(|p| p.matches(text))
}

fn visit_references(
    identity: u64,
    class_ref: &ClassRef,
    analysis: &ClassAnalysis,
    owner: &Option<TextPredicate>,
    name: &Option<TextPredicate>,
    descriptor: &Option<TextPredicate>,
) -> Vec<SearchResult> {
    let mut out = Vec::new();
    for method in &analysis.methods {
        // Merge the three reference lists back into instruction order.
        let mut sites: Vec<(usize, &str, &str, &str)> = Vec::new();
        for site in &method.method_refs {
            sites.push((
                site.index,
                site.member.owner.as_str(),
                site.member.name.as_str(),
                site.member.descriptor.as_str(),
            ));
        }
        for site in &method.field_refs {
            sites.push((
                site.index,
                site.member.owner.as_str(),
                site.member.name.as_str(),
                site.member.descriptor.as_str(),
            ));
        }
        for site in &method.invokedynamics {
            sites.push((
                site.index,
                site.bootstrap.owner.as_str(),
                site.bootstrap.name.as_str(),
                site.bootstrap.descriptor.as_str(),
            ));
        }
        sites.sort_by_key(|(index, ..)| *index);

        for (index, site_owner, site_name, site_descriptor) in sites {
            if matches_opt(owner, site_owner)
                && matches_opt(name, site_name)
                && matches_opt(descriptor, site_descriptor)
            {
                let text = method
                    .instructions
                    .get(index)
                    .map(|entry| entry.text.clone())
                    .unwrap_or_default();
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Method, &method.name, &method.descriptor)
                        .instruction(index)
                        .finish(),
                    detail: ResultDetail::Reference { text },
                });
            }
        }
    }
    out
}

fn visit_declarations(
    identity: u64,
    class_ref: &ClassRef,
    owner: &Option<TextPredicate>,
    name: &Option<TextPredicate>,
    descriptor: &Option<TextPredicate>,
) -> Vec<SearchResult> {
    let class = &class_ref.class.class;
    let mut out = Vec::new();

    // The class declaration itself matches when no member predicate narrows
    // the query down to members.
    if name.is_none() && descriptor.is_none() && matches_opt(owner, &class.name) {
        out.push(SearchResult {
            path: class_path(identity, class_ref).finish(),
            detail: ResultDetail::Declaration {
                text: class.name.clone(),
            },
        });
    }

    if matches_opt(owner, &class.name) {
        for field in &class.fields {
            if matches_opt(name, &field.name) && matches_opt(descriptor, &field.descriptor) {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Field, &field.name, &field.descriptor)
                        .finish(),
                    detail: ResultDetail::Declaration {
                        text: format!("{}.{} {}", class.name, field.name, field.descriptor),
                    },
                });
            }
        }
        for method in &class.methods {
            if matches_opt(name, &method.name) && matches_opt(descriptor, &method.descriptor) {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Method, &method.name, &method.descriptor)
                        .finish(),
                    detail: ResultDetail::Declaration {
                        text: format!("{}.{} {}", class.name, method.name, method.descriptor),
                    },
                });
            }
        }
    }
    out
}

fn visit_instruction_windows(
    identity: u64,
    class_ref: &ClassRef,
    analysis: &ClassAnalysis,
    patterns: &[TextPredicate],
) -> Vec<SearchResult> {
    if patterns.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for method in &analysis.methods {
        if method.corrupt {
            continue;
        }
        let instructions = &method.instructions;
        if instructions.len() < patterns.len() {
            continue;
        }
        for start in 0..=(instructions.len() - patterns.len()) {
            let window_matches = patterns
                .iter()
                .enumerate()
                .all(|(offset, pattern)| pattern.matches(&instructions[start + offset].text));
            if window_matches {
                out.push(SearchResult {
                    path: class_path(identity, class_ref)
                        .member(MemberKind::Method, &method.name, &method.descriptor)
                        .instruction(start)
                        .finish(),
                    detail: ResultDetail::InstructionWindow {
                        texts: instructions[start..start + patterns.len()]
                            .iter()
                            .map(|entry| entry.text.clone())
                            .collect(),
                    },
                });
            }
        }
    }
    out
}

fn run_file_query(
    workspace: &Workspace,
    predicate: &TextPredicate,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    let files = workspace.snapshot_files(options.scope);
    let mut out = Vec::new();
    for file in files {
        if options.cancelled() {
            return Err(SearchError::Cancelled);
        }
        let name_hit = predicate.matches(&file.name);
        let content_hit = if file.entry.text {
            std::str::from_utf8(&file.entry.bytes)
                .ok()
                .and_then(|text| predicate.find(text).map(|span| snippet_around(text, span)))
        } else {
            None
        };
        if name_hit || content_hit.is_some() {
            out.push(SearchResult {
                path: PathBuilder::workspace(workspace.identity())
                    .resource(file.resource_index, &file.resource_name)
                    .bundle("files")
                    .finish(),
                detail: ResultDetail::File {
                    name: file.name.clone(),
                    snippet: content_hit,
                },
            });
        }
    }
    Ok(out)
}

/// ±50 characters of context around a match span, clamped to char
/// boundaries.
fn snippet_around(text: &str, (start, end): (usize, usize)) -> String {
    const CONTEXT: usize = 50;
    let from = floor_char_boundary(text, start.saturating_sub(CONTEXT));
    let to = ceil_char_boundary(text, (end + CONTEXT).min(text.len()));
    text[from..to].to_string()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

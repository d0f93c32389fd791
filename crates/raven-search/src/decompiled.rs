//! Line-oriented regex search over decompiled source.
//!
//! This is the second search path: decompile each in-scope class (the caller
//! supplies a decompile function, usually cache-backed and time-bounded), run
//! the pattern per line, and report `{class, line number, line text}`. A
//! class cap bounds the cost of broad scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use regex::Regex;
use tracing::warn;

use raven_workspace::ClassRef;

use crate::SearchError;

pub const DEFAULT_CLASS_CAP: usize = 50;
pub const MAX_CLASS_CAP: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompiledMatch {
    pub class_name: String,
    /// 1-based line number in the decompiled source.
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompiledSearch {
    pub matches: Vec<DecompiledMatch>,
    /// Number of in-scope classes that were not scanned because of the cap.
    pub skipped_classes: usize,
}

/// Scans up to `class_cap` classes. Decompilation failures skip the class
/// rather than failing the scan.
pub fn search_decompiled(
    classes: &[ClassRef],
    decompile: &(dyn Fn(&ClassRef) -> Result<String, String> + Sync),
    pattern: &Regex,
    class_cap: usize,
    cancel: Option<&Arc<AtomicBool>>,
) -> Result<DecompiledSearch, SearchError> {
    let cap = class_cap.clamp(1, MAX_CLASS_CAP);
    let in_scope = &classes[..classes.len().min(cap)];
    let skipped_classes = classes.len().saturating_sub(in_scope.len());

    let per_class: Result<Vec<Vec<DecompiledMatch>>, SearchError> = in_scope
        .par_iter()
        .map(|class_ref| {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(SearchError::Cancelled);
            }
            let source = match decompile(class_ref) {
                Ok(source) => source,
                Err(err) => {
                    warn!(class = %class_ref.class.name, error = %err, "decompile failed, class skipped");
                    return Ok(Vec::new());
                }
            };
            let mut matches = Vec::new();
            for (line_index, line) in source.lines().enumerate() {
                if pattern.is_match(line) {
                    matches.push(DecompiledMatch {
                        class_name: class_ref.class.name.clone(),
                        line_number: line_index + 1,
                        text: line.to_string(),
                    });
                }
            }
            Ok(matches)
        })
        .collect();

    Ok(DecompiledSearch {
        matches: per_class?.into_iter().flatten().collect(),
        skipped_classes,
    })
}

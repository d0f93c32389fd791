//! Class-name resolution: exact, unique-simple-name, then suggestions.

use thiserror::Error;
use tracing::trace;

use crate::inventory::InventorySnapshot;
use crate::workspace::{ClassRef, Workspace};

const MAX_SUGGESTIONS: usize = 5;
const MAX_EDIT_DISTANCE: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("class {query} not found")]
    NotFound {
        query: String,
        suggestions: Vec<String>,
    },

    #[error("simple name {query} is ambiguous ({} candidates)", candidates.len())]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
}

/// Normalizes a user-supplied class name: trims whitespace and converts dot
/// notation to the internal slash form. A dot/slash mix is accepted.
pub fn normalize_class_name(raw: &str) -> String {
    raw.trim().replace('.', "/")
}

/// Resolves `query` against the workspace.
///
/// Lookup order: exact internal name, then unique simple name (only when the
/// query has no package component), then failure with up to five suggestions
/// drawn from case-insensitive substring matches and close edit distances.
pub fn resolve_class(
    workspace: &Workspace,
    inventory: &InventorySnapshot,
    query: &str,
) -> Result<ClassRef, ResolveError> {
    let normalized = normalize_class_name(query);

    if let Some(found) = workspace.lookup_class(&normalized) {
        return Ok(found);
    }

    if !normalized.contains('/') {
        if let Some(owners) = inventory.simple_index.get(&normalized) {
            match owners.as_slice() {
                [only] => {
                    trace!(query, resolved = only.as_str(), "resolved via simple name");
                    if let Some(found) = workspace.lookup_class(only) {
                        return Ok(found);
                    }
                }
                many if many.len() > 1 => {
                    return Err(ResolveError::Ambiguous {
                        query: normalized,
                        candidates: many.to_vec(),
                    });
                }
                _ => {}
            }
        }
    }

    Err(ResolveError::NotFound {
        suggestions: suggest(inventory, &normalized),
        query: normalized,
    })
}

/// Suggestion scoring: case-insensitive substring hits rank first (shorter
/// names first within the tier), then names within Levenshtein distance 3 of
/// the query's simple name.
fn suggest(inventory: &InventorySnapshot, query: &str) -> Vec<String> {
    let needle = query.rsplit('/').next().unwrap_or(query).to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut substring: Vec<&str> = Vec::new();
    let mut close: Vec<(usize, &str)> = Vec::new();

    for name in inventory.class_names() {
        let simple = name.rsplit('/').next().unwrap_or(name);
        let lower = simple.to_lowercase();
        if lower.contains(&needle) {
            substring.push(name);
            continue;
        }
        let distance = strsim::levenshtein(&lower, &needle);
        if distance <= MAX_EDIT_DISTANCE {
            close.push((distance, name));
        }
    }

    substring.sort_by_key(|name| (name.len(), *name));
    close.sort_by_key(|(distance, name)| (*distance, name.len(), *name));

    substring
        .into_iter()
        .chain(close.into_iter().map(|(_, name)| name))
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{LoadedClass, Resource, ResourceKind};
    use raven_classfile::ClassBuilder;

    fn workspace_with(names: &[&str]) -> Workspace {
        let primary = Resource::new("primary", ResourceKind::Primary);
        for name in names {
            let bytes = ClassBuilder::new(name).build_bytes().unwrap();
            primary
                .insert_class(LoadedClass::parse(bytes).unwrap())
                .unwrap();
        }
        Workspace::from_primary(primary)
    }

    #[test]
    fn exact_name_round_trips_for_every_class() {
        let ws = workspace_with(&["com/x/Foo", "com/y/Bar", "Root"]);
        let inventory = InventorySnapshot::build(&ws);
        for name in ["com/x/Foo", "com/y/Bar", "Root"] {
            let found = resolve_class(&ws, &inventory, name).unwrap();
            assert_eq!(found.class.name, name);
        }
    }

    #[test]
    fn dot_notation_and_whitespace_are_normalized() {
        let ws = workspace_with(&["com/x/Foo"]);
        let inventory = InventorySnapshot::build(&ws);
        let found = resolve_class(&ws, &inventory, "  com.x.Foo \n").unwrap();
        assert_eq!(found.class.name, "com/x/Foo");

        // Mixed dot/slash also resolves.
        let found = resolve_class(&ws, &inventory, "com/x.Foo").unwrap();
        assert_eq!(found.class.name, "com/x/Foo");
    }

    #[test]
    fn unique_simple_name_resolves() {
        let ws = workspace_with(&["com/x/Foo", "com/y/Bar"]);
        let inventory = InventorySnapshot::build(&ws);
        let found = resolve_class(&ws, &inventory, "Foo").unwrap();
        assert_eq!(found.class.name, "com/x/Foo");
    }

    #[test]
    fn duplicate_simple_name_is_ambiguous_with_candidates() {
        let ws = workspace_with(&["com/x/Foo", "com/y/Foo"]);
        let inventory = InventorySnapshot::build(&ws);
        let err = resolve_class(&ws, &inventory, "Foo").unwrap_err();
        match err {
            ResolveError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, vec!["com/x/Foo", "com/y/Foo"]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn not_found_carries_close_suggestions() {
        let ws = workspace_with(&["com/x/Account", "com/x/AccountManager", "com/z/Unrelated"]);
        let inventory = InventorySnapshot::build(&ws);
        let err = resolve_class(&ws, &inventory, "Acount").unwrap_err();
        match err {
            ResolveError::NotFound { suggestions, .. } => {
                assert!(suggestions.contains(&"com/x/Account".to_string()), "{suggestions:?}");
                assert!(suggestions.len() <= 5);
            }
            other => panic!("expected not-found, got {other:?}"),
        }
    }

    #[test]
    fn substring_matches_rank_before_edit_distance() {
        let ws = workspace_with(&["com/x/LoginHandler", "com/x/Logger"]);
        let inventory = InventorySnapshot::build(&ws);
        let err = resolve_class(&ws, &inventory, "login").unwrap_err();
        match err {
            ResolveError::NotFound { suggestions, .. } => {
                assert_eq!(suggestions.first().map(String::as_str), Some("com/x/LoginHandler"));
            }
            other => panic!("expected not-found, got {other:?}"),
        }
    }
}

//! Mapping application and the transform pipeline.
//!
//! `apply_to_primary` is the only mapping write path: every rewritten class
//! is computed from the pre-apply snapshot first, then bundle entries are
//! replaced per class, and the mutation hook fires exactly once after the
//! whole batch. A failure while computing the batch therefore aborts it
//! without touching the workspace.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use raven_workspace::{LoadedClass, ResourceScope, Workspace};

use crate::error::{MappingError, Result};
use crate::mappings::{AggregateMappings, IntermediateMappings};
use crate::remap::remap_class;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub classes_changed: usize,
    pub revision: u64,
}

/// Applies `mappings` to every class in the primary resource.
///
/// An empty mapping set is a no-op: no writes, no revision bump.
pub fn apply_to_primary(
    workspace: &Workspace,
    mappings: &IntermediateMappings,
    aggregate: &AggregateMappings,
) -> Result<ApplyReport> {
    if mappings.is_empty() {
        return Ok(ApplyReport {
            classes_changed: 0,
            revision: workspace.revision(),
        });
    }

    let snapshot = workspace.snapshot_classes(ResourceScope::PrimaryOnly);
    validate_variable_renames(&snapshot, mappings)?;

    // Compute and parse the full batch before writing anything.
    let mut staged: Vec<(String, LoadedClass)> = Vec::new();
    for class_ref in &snapshot {
        if let Some(bytes) = remap_class(&class_ref.class.class, mappings)? {
            let loaded = LoadedClass::parse(bytes).map_err(|source| MappingError::Rewrite {
                name: class_ref.class.name.clone(),
                source,
            })?;
            staged.push((class_ref.class.name.clone(), loaded));
        }
    }

    if staged.is_empty() {
        debug!("mapping batch matched no classes");
        return Ok(ApplyReport {
            classes_changed: 0,
            revision: workspace.revision(),
        });
    }

    // A rename may only land on a name that is free or freed by this batch:
    // no two rewrites may share a final name, and a changed name must not
    // collide with a class the batch leaves untouched.
    let original_names: std::collections::BTreeSet<&str> =
        staged.iter().map(|(name, _)| name.as_str()).collect();
    let mut final_names = std::collections::BTreeSet::new();
    for (original_name, loaded) in &staged {
        let collision = !final_names.insert(loaded.name.as_str())
            || (!original_names.contains(loaded.name.as_str())
                && workspace.primary().get_class(&loaded.name).is_some());
        if collision {
            return Err(MappingError::RenameCollision {
                from: original_name.clone(),
                to: loaded.name.clone(),
            });
        }
    }

    // Two-phase commit against the primary bundle: drop every original
    // entry, then insert the rewrites, so rename chains inside one batch
    // cannot collide with entries they are about to replace.
    let primary = workspace.primary();
    let classes_changed = staged.len();
    for (original_name, _) in &staged {
        primary.remove_class(original_name)?;
    }
    for (_, loaded) in staged {
        primary.insert_class(loaded)?;
    }
    aggregate.record(mappings.clone());
    let revision = workspace.commit_mutation();
    info!(classes_changed, revision, "applied mapping batch");
    Ok(ApplyReport {
        classes_changed,
        revision,
    })
}

/// The documented safe interpretation of variable renames without debug
/// info: fail naming the missing table instead of guessing slots.
fn validate_variable_renames(
    snapshot: &[raven_workspace::ClassRef],
    mappings: &IntermediateMappings,
) -> Result<()> {
    for key in mappings.variables.keys() {
        let Some(class_ref) = snapshot.iter().find(|c| c.class.name == key.owner) else {
            continue;
        };
        let Some(method) = class_ref
            .class
            .class
            .find_method(&key.method_name, &key.method_descriptor)
        else {
            continue;
        };
        let has_table = method
            .code
            .as_ref()
            .is_some_and(|code| !code.locals.is_empty());
        if !has_table {
            return Err(MappingError::LocalVariableTableMissing {
                owner: key.owner.clone(),
                method_name: key.method_name.clone(),
                slot: key.slot,
            });
        }
    }
    Ok(())
}

/// The outcome a transformer hands back: updated classes, removals, and an
/// optional mapping addendum applied after the bytecode updates.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub updated: Vec<(String, Vec<u8>)>,
    pub removed: Vec<String>,
    pub mappings: Option<IntermediateMappings>,
}

/// An external bytecode transformer.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;
    fn transform(&self, workspace: &Workspace) -> std::result::Result<TransformOutcome, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformReport {
    pub classes_updated: usize,
    pub classes_removed: usize,
    pub revision: u64,
}

/// Owns the single-generation undo buffer. The lock is held across
/// snapshot-plus-apply so concurrent transforms serialize.
#[derive(Default)]
pub struct TransformEngine {
    undo: Mutex<Option<BTreeMap<String, Arc<Vec<u8>>>>>,
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_undo(&self) -> bool {
        self.undo.lock().is_some()
    }

    /// Runs `transformers` in order against the workspace. The previous undo
    /// snapshot is discarded and replaced by the pre-apply state of every
    /// primary-resource class.
    pub fn apply(
        &self,
        workspace: &Workspace,
        transformers: &[&dyn Transformer],
        aggregate: &AggregateMappings,
    ) -> Result<TransformReport> {
        let mut undo = self.undo.lock();

        let snapshot: BTreeMap<String, Arc<Vec<u8>>> = workspace
            .snapshot_classes(ResourceScope::PrimaryOnly)
            .into_iter()
            .map(|class_ref| (class_ref.class.name.clone(), class_ref.class.bytes.clone()))
            .collect();

        // Collect every outcome before the first write so a failing
        // transformer aborts the batch with the workspace untouched.
        let mut outcomes = Vec::with_capacity(transformers.len());
        for transformer in transformers {
            let outcome =
                transformer
                    .transform(workspace)
                    .map_err(|message| MappingError::TransformerFailed {
                        name: transformer.name().to_string(),
                        message,
                    })?;
            outcomes.push(outcome);
        }

        *undo = Some(snapshot);

        let mut classes_updated = 0;
        let mut classes_removed = 0;
        let mut addendum = IntermediateMappings::default();
        for outcome in outcomes {
            for (name, bytes) in outcome.updated {
                if workspace.lookup_class(&name).is_some() {
                    workspace.replace_class(&name, bytes)?;
                } else {
                    let loaded = LoadedClass::parse(bytes).map_err(|source| {
                        MappingError::Rewrite {
                            name: name.clone(),
                            source,
                        }
                    })?;
                    workspace.primary().insert_class(loaded)?;
                }
                classes_updated += 1;
            }
            for name in outcome.removed {
                workspace.remove_class(&name)?;
                classes_removed += 1;
            }
            if let Some(mappings) = outcome.mappings {
                addendum.merge(mappings);
            }
        }

        if !addendum.is_empty() {
            let snapshot = workspace.snapshot_classes(ResourceScope::PrimaryOnly);
            validate_variable_renames(&snapshot, &addendum)?;
            for class_ref in &snapshot {
                if let Some(bytes) = remap_class(&class_ref.class.class, &addendum)? {
                    workspace.replace_class(&class_ref.class.name, bytes)?;
                }
            }
            aggregate.record(addendum);
        }

        let revision = workspace.commit_mutation();
        info!(classes_updated, classes_removed, revision, "transform applied");
        Ok(TransformReport {
            classes_updated,
            classes_removed,
            revision,
        })
    }

    /// Restores every snapshotted class byte-for-byte and clears the buffer.
    /// At most one undo generation exists.
    pub fn undo(&self, workspace: &Workspace) -> Result<TransformReport> {
        let mut undo = self.undo.lock();
        let snapshot = undo.take().ok_or(MappingError::NothingToUndo)?;

        let restored: std::result::Result<Vec<LoadedClass>, raven_classfile::Error> = snapshot
            .iter()
            .map(|(_, bytes)| LoadedClass::parse(bytes.as_ref().clone()))
            .collect();
        let restored = restored.map_err(|source| MappingError::Rewrite {
            name: "<undo snapshot>".to_string(),
            source,
        })?;

        let count = restored.len();
        workspace.primary().reset_classes(restored);
        let revision = workspace.commit_mutation();
        info!(classes = count, revision, "transform undone");
        Ok(TransformReport {
            classes_updated: count,
            classes_removed: 0,
            revision,
        })
    }
}

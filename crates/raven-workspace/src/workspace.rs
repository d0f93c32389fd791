//! The workspace: one primary resource, ordered supporting resources, and
//! the revision tracker every cache key hangs off.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::comments::CommentStore;
use crate::error::{Result, WorkspaceError};
use crate::resource::{LoadedClass, Resource, ResourceKind, ResourceScope};

/// Process-wide identity mint. Identities are never reused, so caches keyed
/// by a closed workspace's identity simply become unreachable.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// A class location: which resource (by workspace order) holds the class.
#[derive(Debug, Clone)]
pub struct ClassRef {
    pub resource_index: usize,
    pub resource_name: String,
    pub class: LoadedClass,
}

#[derive(Debug, Clone)]
pub struct FileRef {
    pub resource_index: usize,
    pub resource_name: String,
    pub name: String,
    pub entry: crate::resource::FileEntry,
}

pub struct Workspace {
    identity: u64,
    revision: AtomicU64,
    resources: RwLock<Vec<Arc<Resource>>>,
    comments: CommentStore,
}

impl Workspace {
    /// Opens the artifact at `path` as the primary resource.
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let primary = Resource::from_path(name, ResourceKind::Primary, path)?;
        Ok(Self::from_primary(primary))
    }

    /// Wraps an already-built primary resource. Used by tests and by callers
    /// that assemble classes in memory.
    pub fn from_primary(primary: Resource) -> Self {
        let identity = NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed);
        info!(identity, primary = primary.name(), "workspace opened");
        Self {
            identity,
            revision: AtomicU64::new(0),
            resources: RwLock::new(vec![Arc::new(primary)]),
            comments: CommentStore::default(),
        }
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// The mutation hook. Every operation that writes into a bundle must call
    /// this after the write is visible and before acknowledging the caller;
    /// revision-keyed caches rely on it. Returns the new revision.
    pub fn commit_mutation(&self) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(identity = self.identity, revision, "workspace mutated");
        revision
    }

    pub fn comments(&self) -> &CommentStore {
        &self.comments
    }

    pub fn primary(&self) -> Arc<Resource> {
        self.resources.read()[0].clone()
    }

    /// All resources in lookup order: primary first, then supporting in the
    /// order they were attached.
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        self.resources.read().clone()
    }

    /// Attaches a supporting resource. The caller owns the mutation hook.
    pub fn add_supporting(&self, resource: Resource) {
        debug_assert_eq!(resource.kind(), ResourceKind::Supporting);
        self.resources.write().push(Arc::new(resource));
    }

    /// Finds a class by internal name; the first resource in order wins
    /// (shadowing discipline).
    pub fn lookup_class(&self, internal_name: &str) -> Option<ClassRef> {
        let resources = self.resources.read();
        for (index, resource) in resources.iter().enumerate() {
            if let Some(class) = resource.get_class(internal_name) {
                return Some(ClassRef {
                    resource_index: index,
                    resource_name: resource.name().to_string(),
                    class,
                });
            }
        }
        None
    }

    /// True when the name exists only as an opaque (non-JVM) class entry.
    pub fn is_non_jvm_class(&self, internal_name: &str) -> bool {
        let resources = self.resources.read();
        resources.iter().any(|r| r.has_raw_class(internal_name))
            && !resources.iter().any(|r| r.get_class(internal_name).is_some())
    }

    /// Snapshot of every JVM class in scope, in deterministic order:
    /// resource order first, then class name order within a resource.
    pub fn snapshot_classes(&self, scope: ResourceScope) -> Vec<ClassRef> {
        let resources = self.resources.read();
        let mut out = Vec::new();
        for (index, resource) in resources.iter().enumerate() {
            if scope == ResourceScope::PrimaryOnly && index != 0 {
                break;
            }
            for class in resource.classes() {
                out.push(ClassRef {
                    resource_index: index,
                    resource_name: resource.name().to_string(),
                    class,
                });
            }
        }
        out
    }

    pub fn snapshot_files(&self, scope: ResourceScope) -> Vec<FileRef> {
        let resources = self.resources.read();
        let mut out = Vec::new();
        for (index, resource) in resources.iter().enumerate() {
            if scope == ResourceScope::PrimaryOnly && index != 0 {
                break;
            }
            for (name, entry) in resource.files() {
                out.push(FileRef {
                    resource_index: index,
                    resource_name: resource.name().to_string(),
                    name,
                    entry,
                });
            }
        }
        out
    }

    pub fn class_count(&self, scope: ResourceScope) -> usize {
        let resources = self.resources.read();
        resources
            .iter()
            .take(match scope {
                ResourceScope::PrimaryOnly => 1,
                ResourceScope::All => resources.len(),
            })
            .map(|r| r.class_count())
            .sum()
    }

    /// Replaces a class's bytecode wherever it currently lives. The caller
    /// owns the mutation hook.
    pub fn replace_class(&self, internal_name: &str, bytes: Vec<u8>) -> Result<()> {
        let loaded =
            LoadedClass::parse(bytes).map_err(|source| WorkspaceError::MalformedClass {
                name: internal_name.to_string(),
                source,
            })?;
        if loaded.name != internal_name {
            // A replacement that changes the internal name is a rename; the
            // old entry must go away with the same write.
            let location = self
                .lookup_class(internal_name)
                .ok_or_else(|| WorkspaceError::ClassNotFound {
                    name: internal_name.to_string(),
                })?;
            let resources = self.resources.read();
            return resources[location.resource_index].swap_class(internal_name, loaded);
        }
        let location = self
            .lookup_class(internal_name)
            .ok_or_else(|| WorkspaceError::ClassNotFound {
                name: internal_name.to_string(),
            })?;
        let resources = self.resources.read();
        resources[location.resource_index].replace_class(loaded)
    }

    /// Removes a class from the resource that currently provides it. The
    /// caller owns the mutation hook.
    pub fn remove_class(&self, internal_name: &str) -> Result<()> {
        let location = self
            .lookup_class(internal_name)
            .ok_or_else(|| WorkspaceError::ClassNotFound {
                name: internal_name.to_string(),
            })?;
        let resources = self.resources.read();
        resources[location.resource_index].remove_class(internal_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_classfile::ClassBuilder;

    fn primary_with(classes: &[&str]) -> Resource {
        let resource = Resource::new("primary", ResourceKind::Primary);
        for name in classes {
            let bytes = ClassBuilder::new(name).build_bytes().unwrap();
            resource
                .insert_class(LoadedClass::parse(bytes).unwrap())
                .unwrap();
        }
        resource
    }

    #[test]
    fn identity_is_unique_per_workspace() {
        let a = Workspace::from_primary(primary_with(&["com/x/A"]));
        let b = Workspace::from_primary(primary_with(&["com/x/A"]));
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn revision_starts_at_zero_and_only_the_hook_bumps() {
        let ws = Workspace::from_primary(primary_with(&["com/x/A"]));
        assert_eq!(ws.revision(), 0);
        let _ = ws.lookup_class("com/x/A");
        let _ = ws.snapshot_classes(ResourceScope::All);
        assert_eq!(ws.revision(), 0);
        assert_eq!(ws.commit_mutation(), 1);
        assert_eq!(ws.commit_mutation(), 2);
        assert_eq!(ws.revision(), 2);
    }

    #[test]
    fn primary_shadows_supporting() {
        let ws = Workspace::from_primary(primary_with(&["com/x/A"]));
        let supporting = Resource::new("lib.jar", ResourceKind::Supporting);
        let shadowed = ClassBuilder::new("com/x/A")
            .source_file("Shadowed.java")
            .build_bytes()
            .unwrap();
        supporting
            .insert_class(LoadedClass::parse(shadowed).unwrap())
            .unwrap();
        ws.add_supporting(supporting);

        let found = ws.lookup_class("com/x/A").unwrap();
        assert_eq!(found.resource_index, 0);
        assert_eq!(found.class.class.source_file, None);
    }

    #[test]
    fn snapshot_order_is_resource_then_name() {
        let ws = Workspace::from_primary(primary_with(&["com/x/B", "com/x/A"]));
        let supporting = Resource::new("lib.jar", ResourceKind::Supporting);
        let bytes = ClassBuilder::new("aa/First").build_bytes().unwrap();
        supporting
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
        ws.add_supporting(supporting);

        let names: Vec<String> = ws
            .snapshot_classes(ResourceScope::All)
            .into_iter()
            .map(|c| c.class.name)
            .collect();
        assert_eq!(names, vec!["com/x/A", "com/x/B", "aa/First"]);

        let primary_only: Vec<String> = ws
            .snapshot_classes(ResourceScope::PrimaryOnly)
            .into_iter()
            .map(|c| c.class.name)
            .collect();
        assert_eq!(primary_only, vec!["com/x/A", "com/x/B"]);
    }

    #[test]
    fn duplicate_class_in_same_resource_is_rejected() {
        let resource = primary_with(&["com/x/A"]);
        let duplicate = ClassBuilder::new("com/x/A").build_bytes().unwrap();
        let err = resource
            .insert_class(LoadedClass::parse(duplicate).unwrap())
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::DuplicateClass { .. }));
    }

    #[test]
    fn replace_class_with_rename_swaps_entries() {
        let ws = Workspace::from_primary(primary_with(&["com/x/A"]));
        let renamed = ClassBuilder::new("com/x/A2").build_bytes().unwrap();
        ws.replace_class("com/x/A", renamed).unwrap();
        ws.commit_mutation();

        assert!(ws.lookup_class("com/x/A").is_none());
        assert!(ws.lookup_class("com/x/A2").is_some());
        assert_eq!(ws.revision(), 1);
    }

    #[test]
    fn failed_replace_leaves_state_untouched() {
        let ws = Workspace::from_primary(primary_with(&["com/x/A"]));
        let err = ws.replace_class("com/x/A", vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, WorkspaceError::MalformedClass { .. }));
        assert_eq!(ws.revision(), 0);
        assert!(ws.lookup_class("com/x/A").is_some());
    }
}

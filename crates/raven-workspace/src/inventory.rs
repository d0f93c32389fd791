//! The inventory snapshot: a compact per-class summary plus the indexes the
//! resolver and navigation operations consume.
//!
//! Building is linear in the class count; callers cache the result keyed by
//! `(identity, revision)`.

use std::collections::BTreeMap;

use crate::resource::ResourceScope;
use crate::workspace::Workspace;

/// Label used for the root package in package listings.
pub const DEFAULT_PACKAGE: &str = "(default)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSummary {
    pub name: String,
    pub super_name: Option<String>,
    pub access_flags: u16,
    pub field_count: usize,
    pub method_count: usize,
    pub instruction_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    /// Every JVM class in workspace order (resource order, then name).
    pub classes: Vec<ClassSummary>,
    /// Unique package prefixes in sorted order; contains
    /// [`DEFAULT_PACKAGE`] when any class lives in the root package.
    pub packages: Vec<String>,
    /// Simple name to internal names (a simple name may be claimed by
    /// multiple packages).
    pub simple_index: BTreeMap<String, Vec<String>>,
}

impl InventorySnapshot {
    pub fn build(workspace: &Workspace) -> Self {
        let mut classes = Vec::new();
        let mut packages = std::collections::BTreeSet::new();
        let mut simple_index: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for class_ref in workspace.snapshot_classes(ResourceScope::All) {
            let class = &class_ref.class.class;
            let package = class.package();
            packages.insert(if package.is_empty() {
                DEFAULT_PACKAGE.to_string()
            } else {
                package.to_string()
            });
            simple_index
                .entry(class.simple_name().to_string())
                .or_default()
                .push(class.name.clone());
            classes.push(ClassSummary {
                name: class.name.clone(),
                super_name: class.super_name.clone(),
                access_flags: class.access_flags,
                field_count: class.fields.len(),
                method_count: class.methods.len(),
                instruction_count: class.instruction_count(),
            });
        }

        Self {
            classes,
            packages: packages.into_iter().collect(),
            simple_index,
        }
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }
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
    fn packages_include_default_for_root_classes() {
        let ws = workspace_with(&["com/x/A", "Rootish"]);
        let inventory = InventorySnapshot::build(&ws);
        assert_eq!(inventory.packages, vec![DEFAULT_PACKAGE.to_string(), "com/x".to_string()]);
    }

    #[test]
    fn simple_index_collects_all_owners() {
        let ws = workspace_with(&["com/x/Foo", "com/y/Foo", "com/x/Bar"]);
        let inventory = InventorySnapshot::build(&ws);
        assert_eq!(
            inventory.simple_index.get("Foo"),
            Some(&vec!["com/x/Foo".to_string(), "com/y/Foo".to_string()])
        );
        assert_eq!(inventory.simple_index.get("Bar").map(Vec::len), Some(1));
    }

    #[test]
    fn summaries_carry_member_counts() {
        let primary = Resource::new("primary", ResourceKind::Primary);
        let bytes = ClassBuilder::new("com/x/Counted")
            .field("a", "I")
            .field("b", "J")
            .build_bytes()
            .unwrap();
        primary
            .insert_class(LoadedClass::parse(bytes).unwrap())
            .unwrap();
        let ws = Workspace::from_primary(primary);
        let inventory = InventorySnapshot::build(&ws);
        assert_eq!(inventory.classes.len(), 1);
        assert_eq!(inventory.classes[0].field_count, 2);
        assert_eq!(inventory.classes[0].method_count, 0);
    }
}

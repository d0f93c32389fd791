//! Intermediate mappings: rename dictionaries staged before application.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// `(owner, name, descriptor)` key for field and method renames.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemberKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberKey {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Key for a local-variable rename inside one method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VariableKey {
    pub owner: String,
    pub method_name: String,
    pub method_descriptor: String,
    pub slot: u16,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateMappings {
    /// Old internal name to new internal name.
    pub classes: BTreeMap<String, String>,
    pub fields: BTreeMap<MemberKey, String>,
    pub methods: BTreeMap<MemberKey, String>,
    pub variables: BTreeMap<VariableKey, String>,
}

impl IntermediateMappings {
    pub fn rename_class(old: &str, new: &str) -> Self {
        let mut mappings = Self::default();
        mappings.classes.insert(old.to_string(), new.to_string());
        mappings
    }

    pub fn rename_field(owner: &str, name: &str, descriptor: &str, new_name: &str) -> Self {
        let mut mappings = Self::default();
        mappings
            .fields
            .insert(MemberKey::new(owner, name, descriptor), new_name.to_string());
        mappings
    }

    pub fn rename_method(owner: &str, name: &str, descriptor: &str, new_name: &str) -> Self {
        let mut mappings = Self::default();
        mappings
            .methods
            .insert(MemberKey::new(owner, name, descriptor), new_name.to_string());
        mappings
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
            && self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.fields.len() + self.methods.len() + self.variables.len()
    }

    /// Folds `other` into `self`; later entries win on key collision.
    pub fn merge(&mut self, other: IntermediateMappings) {
        self.classes.extend(other.classes);
        self.fields.extend(other.fields);
        self.methods.extend(other.methods);
        self.variables.extend(other.variables);
    }
}

/// Append-only log of every mapping batch applied during a session. Backs
/// the export and history operations; cleared only when the workspace
/// closes.
#[derive(Default)]
pub struct AggregateMappings {
    applied: Mutex<Vec<IntermediateMappings>>,
}

impl AggregateMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, mappings: IntermediateMappings) {
        self.applied.lock().push(mappings);
    }

    pub fn batch_count(&self) -> usize {
        self.applied.lock().len()
    }

    pub fn history(&self) -> Vec<IntermediateMappings> {
        self.applied.lock().clone()
    }

    /// All applied batches folded in order.
    pub fn merged(&self) -> IntermediateMappings {
        let mut merged = IntermediateMappings::default();
        for batch in self.applied.lock().iter() {
            merged.merge(batch.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_later_entries_win() {
        let mut first = IntermediateMappings::rename_class("a/A", "b/B");
        first.merge(IntermediateMappings::rename_class("a/A", "c/C"));
        assert_eq!(first.classes.get("a/A").map(String::as_str), Some("c/C"));
    }

    #[test]
    fn aggregate_is_append_only() {
        let aggregate = AggregateMappings::new();
        aggregate.record(IntermediateMappings::rename_class("a/A", "b/B"));
        aggregate.record(IntermediateMappings::rename_method("b/B", "m", "()V", "n"));
        assert_eq!(aggregate.batch_count(), 2);

        let merged = aggregate.merged();
        assert_eq!(merged.classes.len(), 1);
        assert_eq!(merged.methods.len(), 1);
    }
}

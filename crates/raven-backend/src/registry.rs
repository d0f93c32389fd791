//! Named decompiler registry with case-insensitive resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Decompiler;

pub struct DecompilerRegistry {
    by_name: BTreeMap<String, Arc<dyn Decompiler>>,
    default_name: String,
}

impl DecompilerRegistry {
    /// Builds a registry seeded with `default` as the fallback backend.
    pub fn new(default: Arc<dyn Decompiler>) -> Self {
        let default_name = default.name().to_lowercase();
        let mut by_name = BTreeMap::new();
        by_name.insert(default_name.clone(), default);
        Self {
            by_name,
            default_name,
        }
    }

    pub fn register(&mut self, decompiler: Arc<dyn Decompiler>) {
        self.by_name
            .insert(decompiler.name().to_lowercase(), decompiler);
    }

    /// Resolves by name (case-insensitive); `None` input means the default.
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn Decompiler>> {
        match name {
            None => self.by_name.get(&self.default_name).cloned(),
            Some(name) => self.by_name.get(&name.to_lowercase()).cloned(),
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StubDecompiler;

    #[test]
    fn resolution_is_case_insensitive() {
        let registry = DecompilerRegistry::new(Arc::new(StubDecompiler));
        assert!(registry.resolve(Some("STUB")).is_some());
        assert!(registry.resolve(Some("stub")).is_some());
        assert!(registry.resolve(Some("unknown")).is_none());
        assert_eq!(registry.resolve(None).unwrap().name(), "stub");
    }
}

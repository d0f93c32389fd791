//! Free-text notes keyed by class or member.
//!
//! Comments annotate the analysis session; they live beside the bundles but
//! never touch bytecode, so setting one does not go through the mutation
//! hook.

use std::collections::BTreeMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommentKey {
    pub class_name: String,
    /// `(name, descriptor)` for a member comment, `None` for a class comment.
    pub member: Option<(String, String)>,
}

#[derive(Default)]
pub struct CommentStore {
    entries: RwLock<BTreeMap<CommentKey, String>>,
}

impl CommentStore {
    /// Sets or clears (empty text) the comment for `key`.
    pub fn set(&self, key: CommentKey, text: String) {
        let mut entries = self.entries.write();
        if text.is_empty() {
            entries.remove(&key);
        } else {
            entries.insert(key, text);
        }
    }

    pub fn get(&self, key: &CommentKey) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// All comments in key order; optionally restricted to one class.
    pub fn list(&self, class_name: Option<&str>) -> Vec<(CommentKey, String)> {
        self.entries
            .read()
            .iter()
            .filter(|(key, _)| class_name.is_none_or(|c| key.class_name == c))
            .map(|(key, text)| (key.clone(), text.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_clear() {
        let store = CommentStore::default();
        let key = CommentKey {
            class_name: "com/x/A".into(),
            member: None,
        };
        store.set(key.clone(), "entry point".into());
        assert_eq!(store.get(&key).as_deref(), Some("entry point"));

        store.set(key.clone(), String::new());
        assert_eq!(store.get(&key), None);
    }

    #[test]
    fn list_filters_by_class() {
        let store = CommentStore::default();
        store.set(
            CommentKey {
                class_name: "com/x/A".into(),
                member: None,
            },
            "a".into(),
        );
        store.set(
            CommentKey {
                class_name: "com/x/A".into(),
                member: Some(("run".into(), "()V".into())),
            },
            "loop body".into(),
        );
        store.set(
            CommentKey {
                class_name: "com/x/B".into(),
                member: None,
            },
            "b".into(),
        );

        assert_eq!(store.list(None).len(), 3);
        assert_eq!(store.list(Some("com/x/A")).len(), 2);
    }
}

//! Inheritance queries: supertype chains, a reverse subtype index, and
//! lowest-common-ancestor.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use raven_workspace::{ResourceScope, Workspace};

/// Ordered supertype chain of `class_name`, starting with the class itself.
///
/// Walks the superclass first, then declared interfaces breadth-first.
/// External (unloaded) names appear in the chain but terminate their branch.
pub fn supertype_chain(workspace: &Workspace, class_name: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([class_name.to_string()]);

    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(found) = workspace.lookup_class(&name) {
            let class = &found.class.class;
            if let Some(super_name) = &class.super_name {
                queue.push_back(super_name.clone());
            }
            for interface in &class.interfaces {
                queue.push_back(interface.clone());
            }
        }
        chain.push(name);
    }
    chain
}

/// Supertypes of a class, excluding the class itself.
pub fn supertypes(workspace: &Workspace, class_name: &str) -> Vec<String> {
    let mut chain = supertype_chain(workspace, class_name);
    if !chain.is_empty() {
        chain.remove(0);
    }
    chain
}

/// Lowest common ancestor: the first element of `a`'s ordered chain that
/// also appears in `b`'s chain.
pub fn common_ancestor(workspace: &Workspace, a: &str, b: &str) -> Option<String> {
    let chain_a = supertype_chain(workspace, a);
    let chain_b: BTreeSet<String> = supertype_chain(workspace, b).into_iter().collect();
    chain_a.into_iter().find(|name| chain_b.contains(name))
}

/// Reverse edges over the loaded corpus: super/interface name to the classes
/// that directly extend/implement it.
pub struct SubtypeIndex {
    direct: HashMap<String, Vec<String>>,
}

impl SubtypeIndex {
    pub fn build(workspace: &Workspace) -> Self {
        let mut direct: HashMap<String, Vec<String>> = HashMap::new();
        for class_ref in workspace.snapshot_classes(ResourceScope::All) {
            let class = &class_ref.class.class;
            if let Some(super_name) = &class.super_name {
                direct
                    .entry(super_name.clone())
                    .or_default()
                    .push(class.name.clone());
            }
            for interface in &class.interfaces {
                direct
                    .entry(interface.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        // Shadowed duplicates across resources would repeat here.
        for children in direct.values_mut() {
            children.sort();
            children.dedup();
        }
        Self { direct }
    }

    pub fn direct_subtypes(&self, class_name: &str) -> Vec<String> {
        self.direct.get(class_name).cloned().unwrap_or_default()
    }

    /// Direct plus transitive subtypes in breadth-first order.
    pub fn all_subtypes(&self, class_name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<String> = self.direct_subtypes(class_name).into();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            queue.extend(self.direct_subtypes(&name));
            out.push(name);
        }
        out
    }
}

struct BuiltIndex {
    identity: u64,
    revision: u64,
    index: Arc<SubtypeIndex>,
}

/// Caches the eager reverse index per `(identity, revision)`; a revision
/// bump invalidates it and the next query rebuilds on demand.
#[derive(Default)]
pub struct InheritanceService {
    state: RwLock<Option<BuiltIndex>>,
}

impl InheritanceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subtype_index(&self, workspace: &Workspace) -> Arc<SubtypeIndex> {
        let identity = workspace.identity();
        let revision = workspace.revision();
        if let Some(built) = self.state.read().as_ref() {
            if built.identity == identity && built.revision == revision {
                return built.index.clone();
            }
        }
        debug!(identity, revision, "rebuilding subtype index");
        let index = Arc::new(SubtypeIndex::build(workspace));
        *self.state.write() = Some(BuiltIndex {
            identity,
            revision,
            index: index.clone(),
        });
        index
    }
}

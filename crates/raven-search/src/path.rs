//! Typed result locations.
//!
//! Every search result carries a root-to-leaf chain of path nodes
//! (workspace, resource, bundle, class, member, instruction) so callers can
//! extract the owner class, the member triple, or the instruction index
//! without re-running the query.

use raven_classfile::MemberKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNode {
    Workspace { identity: u64 },
    Resource { index: usize, name: String },
    Bundle { name: &'static str },
    Class { name: String },
    Member {
        kind: MemberKind,
        name: String,
        descriptor: String,
    },
    Instruction { index: usize },
}

/// Root-to-leaf chain; always starts at the workspace node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathChain {
    nodes: Vec<PathNode>,
}

impl PathChain {
    pub fn new(nodes: Vec<PathNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn class_name(&self) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            PathNode::Class { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn member(&self) -> Option<(MemberKind, &str, &str)> {
        self.nodes.iter().find_map(|node| match node {
            PathNode::Member {
                kind,
                name,
                descriptor,
            } => Some((*kind, name.as_str(), descriptor.as_str())),
            _ => None,
        })
    }

    pub fn instruction_index(&self) -> Option<usize> {
        self.nodes.iter().find_map(|node| match node {
            PathNode::Instruction { index } => Some(*index),
            _ => None,
        })
    }

    pub fn resource(&self) -> Option<(usize, &str)> {
        self.nodes.iter().find_map(|node| match node {
            PathNode::Resource { index, name } => Some((*index, name.as_str())),
            _ => None,
        })
    }
}

/// Builder used by the engine while descending the workspace tree.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    nodes: Vec<PathNode>,
}

impl PathBuilder {
    pub fn workspace(identity: u64) -> Self {
        Self {
            nodes: vec![PathNode::Workspace { identity }],
        }
    }

    pub fn resource(mut self, index: usize, name: &str) -> Self {
        self.nodes.push(PathNode::Resource {
            index,
            name: name.to_string(),
        });
        self
    }

    pub fn bundle(mut self, name: &'static str) -> Self {
        self.nodes.push(PathNode::Bundle { name });
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.nodes.push(PathNode::Class {
            name: name.to_string(),
        });
        self
    }

    pub fn member(mut self, kind: MemberKind, name: &str, descriptor: &str) -> Self {
        self.nodes.push(PathNode::Member {
            kind,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    pub fn instruction(mut self, index: usize) -> Self {
        self.nodes.push(PathNode::Instruction { index });
        self
    }

    pub fn finish(self) -> PathChain {
        PathChain::new(self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_accessors_find_their_nodes() {
        let chain = PathBuilder::workspace(7)
            .resource(0, "app.jar")
            .bundle("jvm")
            .class("com/x/A")
            .member(MemberKind::Method, "run", "()V")
            .instruction(3)
            .finish();

        assert_eq!(chain.class_name(), Some("com/x/A"));
        assert_eq!(chain.member(), Some((MemberKind::Method, "run", "()V")));
        assert_eq!(chain.instruction_index(), Some(3));
        assert_eq!(chain.resource(), Some((0, "app.jar")));
    }
}

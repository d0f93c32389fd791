//! The per-workspace call graph.
//!
//! Vertices are method triples held in a flat array with integer ids;
//! adjacency lists carry both directions. Edges come only from direct
//! `invoke*` references in the cached analyses; invokedynamic does not
//! contribute edges (the bootstrap target stays visible through xrefs-from).
//!
//! Construction is explicit: queries against a graph that has not been built
//! for the workspace's current revision fail with [`GraphError::NotReady`].
//! A revision bump therefore invalidates the graph without tearing it down
//! eagerly.

use std::collections::HashMap;

use parking_lot::RwLock;
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use raven_search::AnalysisProvider;
use raven_workspace::{ResourceScope, Workspace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("call graph not initialized for the current workspace revision; run callgraph-build first")]
    NotReady,
}

/// A call-graph vertex: `(owner, name, descriptor)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodId {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} {}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug)]
pub struct CallGraph {
    vertices: Vec<MethodId>,
    index: HashMap<MethodId, usize>,
    callees: Vec<Vec<usize>>,
    callers: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSearch {
    pub found: bool,
    pub path: Vec<MethodId>,
}

impl CallGraph {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.callees.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.index.contains_key(id)
    }

    pub fn callees(&self, id: &MethodId) -> Vec<MethodId> {
        self.adjacency(id, &self.callees)
    }

    pub fn callers(&self, id: &MethodId) -> Vec<MethodId> {
        self.adjacency(id, &self.callers)
    }

    fn adjacency(&self, id: &MethodId, lists: &[Vec<usize>]) -> Vec<MethodId> {
        let Some(&vertex) = self.index.get(id) else {
            return Vec::new();
        };
        lists[vertex]
            .iter()
            .map(|&other| self.vertices[other].clone())
            .collect()
    }

    /// BFS shortest path over the callee direction, bounded by `max_depth`
    /// edges. Unreachable or depth-exhausted searches report `found: false`.
    pub fn find_path(&self, source: &MethodId, target: &MethodId, max_depth: usize) -> PathSearch {
        let (Some(&from), Some(&to)) = (self.index.get(source), self.index.get(target)) else {
            return PathSearch {
                found: false,
                path: Vec::new(),
            };
        };
        if from == to {
            return PathSearch {
                found: true,
                path: vec![self.vertices[from].clone()],
            };
        }

        let mut predecessor: Vec<Option<usize>> = vec![None; self.vertices.len()];
        let mut visited = vec![false; self.vertices.len()];
        visited[from] = true;
        let mut frontier = vec![from];

        for _depth in 0..max_depth {
            let mut next = Vec::new();
            for &vertex in &frontier {
                for &callee in &self.callees[vertex] {
                    if visited[callee] {
                        continue;
                    }
                    visited[callee] = true;
                    predecessor[callee] = Some(vertex);
                    if callee == to {
                        return PathSearch {
                            found: true,
                            path: self.reconstruct(from, to, &predecessor),
                        };
                    }
                    next.push(callee);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        PathSearch {
            found: false,
            path: Vec::new(),
        }
    }

    fn reconstruct(&self, from: usize, to: usize, predecessor: &[Option<usize>]) -> Vec<MethodId> {
        let mut path = vec![to];
        let mut cursor = to;
        while cursor != from {
            cursor = predecessor[cursor].expect("predecessor chain reaches the source");
            path.push(cursor);
        }
        path.reverse();
        path.into_iter()
            .map(|vertex| self.vertices[vertex].clone())
            .collect()
    }
}

struct Builder {
    vertices: Vec<MethodId>,
    index: HashMap<MethodId, usize>,
    edges: Vec<(usize, usize)>,
}

impl Builder {
    fn vertex(&mut self, id: MethodId) -> usize {
        if let Some(&existing) = self.index.get(&id) {
            return existing;
        }
        let next = self.vertices.len();
        self.vertices.push(id.clone());
        self.index.insert(id, next);
        next
    }

    fn finish(self) -> CallGraph {
        let mut callees = vec![Vec::new(); self.vertices.len()];
        let mut callers = vec![Vec::new(); self.vertices.len()];
        for (from, to) in self.edges {
            if !callees[from].contains(&to) {
                callees[from].push(to);
                callers[to].push(from);
            }
        }
        CallGraph {
            vertices: self.vertices,
            index: self.index,
            callees,
            callers,
        }
    }
}

struct BuiltGraph {
    identity: u64,
    revision: u64,
    graph: std::sync::Arc<CallGraph>,
}

/// Holds the lazily built graph and its `(identity, revision)` validity key.
#[derive(Default)]
pub struct CallGraphService {
    state: RwLock<Option<BuiltGraph>>,
}

impl CallGraphService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds (or rebuilds) the graph for the workspace's current revision.
    pub fn build(
        &self,
        workspace: &Workspace,
        provider: &dyn AnalysisProvider,
    ) -> std::sync::Arc<CallGraph> {
        let identity = workspace.identity();
        let revision = workspace.revision();
        if let Some(built) = self.state.read().as_ref() {
            if built.identity == identity && built.revision == revision {
                return built.graph.clone();
            }
        }

        let classes = workspace.snapshot_classes(ResourceScope::All);
        let analyses: Vec<_> = classes
            .par_iter()
            .map(|class_ref| provider.analysis(class_ref))
            .collect();

        let mut builder = Builder {
            vertices: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        };
        for analysis in &analyses {
            for method in &analysis.methods {
                let caller = builder.vertex(MethodId::new(
                    &analysis.class_name,
                    &method.name,
                    &method.descriptor,
                ));
                for site in &method.method_refs {
                    let callee = builder.vertex(MethodId::new(
                        &site.member.owner,
                        &site.member.name,
                        &site.member.descriptor,
                    ));
                    builder.edges.push((caller, callee));
                }
            }
        }
        let graph = std::sync::Arc::new(builder.finish());
        info!(
            identity,
            revision,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "call graph built"
        );
        *self.state.write() = Some(BuiltGraph {
            identity,
            revision,
            graph: graph.clone(),
        });
        graph
    }

    /// Returns the ready graph, or `NotReady` when it has not been built for
    /// the workspace's current revision.
    pub fn get(&self, workspace: &Workspace) -> Result<std::sync::Arc<CallGraph>, GraphError> {
        let state = self.state.read();
        match state.as_ref() {
            Some(built)
                if built.identity == workspace.identity()
                    && built.revision == workspace.revision() =>
            {
                Ok(built.graph.clone())
            }
            _ => Err(GraphError::NotReady),
        }
    }
}

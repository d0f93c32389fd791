#![forbid(unsafe_code)]

//! Graph services over the workspace: cross-references, the call graph, and
//! inheritance queries.

mod callgraph;
mod inheritance;
mod xref;

pub use crate::callgraph::{CallGraph, CallGraphService, GraphError, MethodId, PathSearch};
pub use crate::inheritance::{
    common_ancestor, supertype_chain, supertypes, InheritanceService, SubtypeIndex,
};
pub use crate::xref::{xrefs_from, xrefs_to, OutgoingRefs, XrefSite};

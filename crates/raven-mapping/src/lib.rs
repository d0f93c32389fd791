#![forbid(unsafe_code)]

//! Symbolic renames and bytecode transforms: intermediate mappings, the
//! remapper, batch application with a single revision bump, and the
//! single-generation transform undo buffer.

mod engine;
mod error;
mod mappings;
mod remap;

pub use crate::engine::{
    apply_to_primary, ApplyReport, TransformEngine, TransformOutcome, TransformReport, Transformer,
};
pub use crate::error::{MappingError, Result};
pub use crate::mappings::{AggregateMappings, IntermediateMappings, MemberKey, VariableKey};
pub use crate::remap::remap_class;

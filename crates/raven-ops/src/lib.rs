#![forbid(unsafe_code)]

//! The operation surface: a registry of named operations over a server
//! context, with uniform argument extraction and the central error policy.

mod context;
mod error;
mod handlers;
mod params;
mod registry;

pub use crate::context::{CachedAnalyses, ServerContext, Session, DECOMPILE_TIMEOUT};
pub use crate::error::{OpError, OpResult};
pub use crate::params::Params;
pub use crate::registry::{Handler, OpDescriptor, OperationRegistry, ParamSpec};

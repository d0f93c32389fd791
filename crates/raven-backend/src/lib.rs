#![forbid(unsafe_code)]

//! External capability interfaces: decompiler, assembler, compiler, and
//! phantom generation.
//!
//! The core consumes these as object-safe traits and translates their
//! failures into the operation error policy. One decompiler ships built in
//! (the stub renderer) so the server is usable without external tooling;
//! richer backends register alongside it under their own names.

mod phantom;
mod registry;
mod stub;

pub use crate::phantom::PhantomStubs;
pub use crate::registry::DecompilerRegistry;
pub use crate::stub::StubDecompiler;

use std::collections::BTreeMap;

use raven_workspace::{LoadedClass, Resource, Workspace};
use thiserror::Error;

/// One diagnostic from an external backend, reported verbatim to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDiagnostic {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl BackendDiagnostic {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            line: None,
            column: None,
            message: message.into(),
        }
    }
}

/// A typed backend failure: a summary plus per-position diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
    pub diagnostics: Vec<BackendDiagnostic>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(
        message: impl Into<String>,
        diagnostics: Vec<BackendDiagnostic>,
    ) -> Self {
        Self {
            message: message.into(),
            diagnostics,
        }
    }
}

/// Bytecode-to-source decompilation. Implementations may be called
/// concurrently and must stay cancellation-safe: the caller enforces a
/// wall-clock timeout and abandons the result.
pub trait Decompiler: Send + Sync {
    fn name(&self) -> &str;
    fn decompile(&self, workspace: &Workspace, class: &LoadedClass)
        -> Result<String, BackendError>;
}

/// Textual disassembly and reassembly of single classes.
pub trait Assembler: Send + Sync {
    fn disassemble(&self, class: &LoadedClass) -> Result<String, BackendError>;
    fn assemble(&self, source: &str, workspace: &Workspace) -> Result<Vec<u8>, BackendError>;
}

/// Source-to-bytecode compilation; the result maps internal names to
/// classfile bytes (a single source can produce nested classes).
pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        class_name: &str,
        source: &str,
        workspace: &Workspace,
    ) -> Result<BTreeMap<String, Vec<u8>>, BackendError>;
}

/// Generates phantom stubs for types referenced but not present, packaged
/// as a supporting resource.
pub trait PhantomGenerator: Send + Sync {
    fn create_phantoms(&self, workspace: &Workspace) -> Result<Resource, BackendError>;
}

#![forbid(unsafe_code)]

//! The in-memory workspace: a primary artifact plus supporting resources,
//! with ordered shadowing lookup, a monotonic revision tracker, name
//! resolution, and import/export.

mod comments;
mod error;
mod export;
mod inventory;
mod resolve;
mod resource;
mod workspace;

pub use crate::comments::{CommentKey, CommentStore};
pub use crate::error::{Result, WorkspaceError};
pub use crate::export::{export_primary, CompressionMode, OutputType};
pub use crate::inventory::{ClassSummary, InventorySnapshot, DEFAULT_PACKAGE};
pub use crate::resolve::{normalize_class_name, resolve_class, ResolveError};
pub use crate::resource::{FileEntry, LoadedClass, Resource, ResourceKind, ResourceScope};
pub use crate::workspace::{ClassRef, FileRef, Workspace};

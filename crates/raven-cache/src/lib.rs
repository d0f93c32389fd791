#![forbid(unsafe_code)]

//! Revision-keyed in-memory caches for derived artifacts.
//!
//! Every cache key starts with `(workspace identity, revision)`, so a
//! revision bump makes formerly-valid entries unreachable rather than
//! requiring synchronous invalidation; they age out via TTL, capacity
//! pressure, or an explicit purge of dead workspace identities.

mod keys;
mod store;

pub use keys::{AnalysisKey, CacheKey, DecompileKey, InventoryKey, QueryKey};
pub use store::{Cache, CacheConfig};

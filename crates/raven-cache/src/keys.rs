//! Typed cache keys.
//!
//! Keys own their data (names, hashes) rather than borrowing from workspace
//! state, so a closed workspace leaves no dangling references behind; its
//! entries are swept by [`crate::Cache::purge_dead`].

/// Implemented by every cache key so stores can evict entries belonging to
/// workspaces that no longer exist.
pub trait CacheKey {
    fn workspace_identity(&self) -> u64;
}

/// Key for decompilation output: the decompiler name participates because
/// different backends produce different text for the same bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecompileKey {
    pub identity: u64,
    pub revision: u64,
    pub class_name: String,
    pub content_hash: u32,
    pub decompiler: String,
}

impl CacheKey for DecompileKey {
    fn workspace_identity(&self) -> u64 {
        self.identity
    }
}

/// Key for per-class instruction analyses. The content hash guards against
/// bytecode rewrites that reuse a class name within one revision window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    pub identity: u64,
    pub revision: u64,
    pub class_name: String,
    pub content_hash: u32,
}

impl CacheKey for AnalysisKey {
    fn workspace_identity(&self) -> u64 {
        self.identity
    }
}

/// Key for the workspace inventory snapshot; identity + revision alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryKey {
    pub identity: u64,
    pub revision: u64,
}

impl CacheKey for InventoryKey {
    fn workspace_identity(&self) -> u64 {
        self.identity
    }
}

/// Key for materialized search results: the issuing tool plus the normalized
/// query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub identity: u64,
    pub revision: u64,
    pub tool: String,
    pub query: String,
}

impl CacheKey for QueryKey {
    fn workspace_identity(&self) -> u64 {
        self.identity
    }
}

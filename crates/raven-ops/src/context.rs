//! The root context owning the workspace session, caches, and backends.
//!
//! No global state: operations receive the context explicitly and everything
//! a mutating operation invalidates flows through the revision in the cache
//! keys.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use raven_analysis::ClassAnalysis;
use raven_backend::{
    Assembler, Compiler, DecompilerRegistry, PhantomGenerator, PhantomStubs, StubDecompiler,
};
use raven_cache::{AnalysisKey, Cache, CacheConfig, DecompileKey, InventoryKey, QueryKey};
use raven_config::ServerConfig;
use raven_graph::{CallGraphService, InheritanceService};
use raven_mapping::{AggregateMappings, TransformEngine, Transformer};
use raven_search::{
    run_query, AnalysisProvider, Query, SearchOptions, SearchResult,
};
use raven_workspace::{
    normalize_class_name, resolve_class, ClassRef, InventorySnapshot, ResolveError, ResourceScope,
    Workspace,
};

use crate::error::{OpError, OpResult};

/// Default wall-clock cap on a single decompiler-backend call.
pub const DECOMPILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything scoped to one open workspace. Dropped wholesale on close, so
/// per-workspace services can never leak across sessions.
pub struct Session {
    pub workspace: Arc<Workspace>,
    pub aggregate: AggregateMappings,
    pub transforms: TransformEngine,
    pub callgraph: CallGraphService,
    pub inheritance: InheritanceService,
}

impl Session {
    fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Arc::new(workspace),
            aggregate: AggregateMappings::new(),
            transforms: TransformEngine::new(),
            callgraph: CallGraphService::new(),
            inheritance: InheritanceService::new(),
        }
    }
}

pub struct ServerContext {
    config: ServerConfig,
    session: RwLock<Option<Arc<Session>>>,
    decompile_cache: Cache<DecompileKey, String>,
    inventory_cache: Cache<InventoryKey, InventorySnapshot>,
    analysis_cache: Cache<AnalysisKey, ClassAnalysis>,
    query_cache: Cache<QueryKey, Vec<SearchResult>>,
    decompilers: RwLock<DecompilerRegistry>,
    assembler: RwLock<Option<Arc<dyn Assembler>>>,
    compiler: RwLock<Option<Arc<dyn Compiler>>>,
    phantom: Arc<dyn PhantomGenerator>,
    transformers: RwLock<BTreeMap<String, Arc<dyn Transformer>>>,
    pub decompile_timeout: Duration,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let cache_config = CacheConfig {
            enabled: config.cache.enabled,
            ttl: Duration::from_secs(u64::from(config.cache.ttl_seconds)),
            max_entries: config.cache.max_entries as usize,
        };
        Self {
            config,
            session: RwLock::new(None),
            decompile_cache: Cache::new("decompile", cache_config),
            inventory_cache: Cache::new("inventory", cache_config),
            analysis_cache: Cache::new("analysis", cache_config),
            query_cache: Cache::new("query", cache_config),
            decompilers: RwLock::new(DecompilerRegistry::new(Arc::new(StubDecompiler))),
            assembler: RwLock::new(None),
            compiler: RwLock::new(None),
            phantom: Arc::new(PhantomStubs),
            transformers: RwLock::new(BTreeMap::new()),
            decompile_timeout: DECOMPILE_TIMEOUT,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // -- session lifecycle --------------------------------------------------

    pub fn open_workspace(&self, workspace: Workspace) -> Arc<Session> {
        let session = Arc::new(Session::new(workspace));
        let identity = session.workspace.identity();
        *self.session.write() = Some(session.clone());
        // Entries for any previous workspace are unreachable now; sweep them.
        self.purge_caches(&[identity]);
        info!(identity, "workspace session opened");
        session
    }

    /// Closes the current session; cache entries die with the identity.
    pub fn close_workspace(&self) -> bool {
        let closed = self.session.write().take();
        match closed {
            Some(session) => {
                self.purge_caches(&[]);
                info!(identity = session.workspace.identity(), "workspace closed");
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> OpResult<Arc<Session>> {
        self.session.read().clone().ok_or(OpError::NoWorkspace)
    }

    fn purge_caches(&self, live: &[u64]) {
        self.decompile_cache.purge_dead(live);
        self.inventory_cache.purge_dead(live);
        self.analysis_cache.purge_dead(live);
        self.query_cache.purge_dead(live);
    }

    pub fn cache_sizes(&self) -> [(&'static str, usize); 4] {
        [
            ("decompile", self.decompile_cache.len()),
            ("inventory", self.inventory_cache.len()),
            ("analysis", self.analysis_cache.len()),
            ("query", self.query_cache.len()),
        ]
    }

    // -- backend registration ----------------------------------------------

    pub fn register_decompiler(&self, decompiler: Arc<dyn raven_backend::Decompiler>) {
        self.decompilers.write().register(decompiler);
    }

    pub fn decompiler_names(&self) -> (String, Vec<String>) {
        let registry = self.decompilers.read();
        (registry.default_name().to_string(), registry.names())
    }

    pub fn set_assembler(&self, assembler: Arc<dyn Assembler>) {
        *self.assembler.write() = Some(assembler);
    }

    pub fn assembler(&self) -> OpResult<Arc<dyn Assembler>> {
        self.assembler.read().clone().ok_or(OpError::Unsupported {
            message: "no assembler backend is available in this runtime".to_string(),
        })
    }

    pub fn set_compiler(&self, compiler: Arc<dyn Compiler>) {
        *self.compiler.write() = Some(compiler);
    }

    pub fn compiler(&self) -> OpResult<Arc<dyn Compiler>> {
        self.compiler.read().clone().ok_or(OpError::Unsupported {
            message: "no compiler backend is available in this runtime".to_string(),
        })
    }

    pub fn phantom_generator(&self) -> Arc<dyn PhantomGenerator> {
        self.phantom.clone()
    }

    pub fn register_transformer(&self, transformer: Arc<dyn Transformer>) {
        self.transformers
            .write()
            .insert(transformer.name().to_lowercase(), transformer);
    }

    pub fn transformer(&self, name: &str) -> OpResult<Arc<dyn Transformer>> {
        let registry = self.transformers.read();
        match registry.get(&name.to_lowercase()) {
            Some(transformer) => Ok(transformer.clone()),
            None => Err(OpError::NotFound {
                message: format!("no transformer named {name} is registered"),
                suggestions: registry.keys().take(5).cloned().collect(),
            }),
        }
    }

    // -- cached derived artifacts -------------------------------------------

    pub fn inventory(&self, session: &Session) -> Arc<InventorySnapshot> {
        let workspace = &session.workspace;
        let key = InventoryKey {
            identity: workspace.identity(),
            revision: workspace.revision(),
        };
        let loaded: Result<_, Infallible> = self
            .inventory_cache
            .get_or_load(key, || Ok(InventorySnapshot::build(workspace)));
        loaded.unwrap_or_else(|never| match never {})
    }

    pub fn analyses<'a>(&'a self, session: &'a Session) -> CachedAnalyses<'a> {
        CachedAnalyses { ctx: self, session }
    }

    /// Resolves a class name, translating resolution failures into the wire
    /// taxonomy and flagging non-JVM classes as `unsupported`.
    pub fn resolve_class(&self, session: &Session, query: &str) -> OpResult<ClassRef> {
        let inventory = self.inventory(session);
        match resolve_class(&session.workspace, &inventory, query) {
            Ok(found) => Ok(found),
            Err(err) => {
                if matches!(err, ResolveError::NotFound { .. }) {
                    let normalized = normalize_class_name(query);
                    if session.workspace.is_non_jvm_class(&normalized) {
                        return Err(OpError::Unsupported {
                            message: format!("class {normalized} is not a JVM class"),
                        });
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Decompiles through the cache; the second identical request must not
    /// reach the backend. The backend call itself is bounded by
    /// [`Self::decompile_timeout`].
    pub fn decompile(
        &self,
        session: &Session,
        class_ref: &ClassRef,
        decompiler_name: Option<&str>,
    ) -> OpResult<Arc<String>> {
        let requested = decompiler_name.or(self.config.decompiler.as_deref());
        let decompiler = self
            .decompilers
            .read()
            .resolve(requested)
            .ok_or_else(|| {
                OpError::bad_parameter(
                    "decompiler",
                    format!("unknown decompiler {}", requested.unwrap_or_default()),
                )
            })?;

        let workspace = &session.workspace;
        let key = DecompileKey {
            identity: workspace.identity(),
            revision: workspace.revision(),
            class_name: class_ref.class.name.clone(),
            content_hash: class_ref.class.content_hash,
            decompiler: decompiler.name().to_string(),
        };
        self.decompile_cache.get_or_load(key, || {
            let workspace = workspace.clone();
            let class = class_ref.class.clone();
            let backend = decompiler.clone();
            let class_name = class.name.clone();
            run_with_timeout(self.decompile_timeout, move || {
                backend.decompile(&workspace, &class)
            })
            .ok_or_else(|| OpError::Timeout {
                message: format!("decompilation of {class_name} exceeded the time limit"),
            })?
            .map_err(OpError::from)
        })
    }

    /// Runs a search through the revision-keyed query cache.
    pub fn cached_query(
        &self,
        session: &Session,
        tool: &str,
        query: &Query,
        scope: ResourceScope,
    ) -> OpResult<Arc<Vec<SearchResult>>> {
        let workspace = &session.workspace;
        let key = QueryKey {
            identity: workspace.identity(),
            revision: workspace.revision(),
            tool: tool.to_string(),
            query: format!("{}|{:?}", query.cache_token(), scope),
        };
        self.query_cache.get_or_load(key, || {
            let options = SearchOptions { scope, cancel: None };
            run_query(workspace, &self.analyses(session), query, &options).map_err(OpError::from)
        })
    }
}

/// Cache-backed [`AnalysisProvider`] handed to the search engine and the
/// call-graph builder.
pub struct CachedAnalyses<'a> {
    ctx: &'a ServerContext,
    session: &'a Session,
}

impl AnalysisProvider for CachedAnalyses<'_> {
    fn analysis(&self, class: &ClassRef) -> Arc<ClassAnalysis> {
        let workspace = &self.session.workspace;
        let key = AnalysisKey {
            identity: workspace.identity(),
            revision: workspace.revision(),
            class_name: class.class.name.clone(),
            content_hash: class.class.content_hash,
        };
        let loaded: Result<_, Infallible> = self
            .ctx
            .analysis_cache
            .get_or_load(key, || Ok(ClassAnalysis::analyze(&class.class.class)));
        loaded.unwrap_or_else(|never| match never {})
    }
}

/// Runs `f` on a worker thread, abandoning the result on timeout. The
/// abandoned worker finishes in the background; backends are required to be
/// cancellation-safe under that contract.
fn run_with_timeout<T: Send + 'static>(
    timeout: Duration,
    f: impl FnOnce() -> T + Send + 'static,
) -> Option<T> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).ok()
}

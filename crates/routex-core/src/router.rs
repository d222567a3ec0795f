use crate::bundler::{BundleFactory, ConcatBundles};
use crate::config::{RouteConfig, SiteConfig};
use crate::context::{self, Context, Payload};
use crate::engine::PipelineEngine;
use crate::error::{Result, RoutexError};
use crate::files::{read_head, FileDescriptor, FileEnumerator, WalkEnumerator};
use crate::handler::Handler;
use crate::pattern::{DefaultPatterns, PatternGenerator, RenderOptions};
use crate::pipeline::{bundle_stage, compile_stage, data_stage, Stage};
use crate::query::{JsonDataExecutor, QueryExecutor};
use crate::registry::EngineRegistry;
use core::sync::atomic::Ordering;
use crossbeam_epoch::{self as epoch, Atomic, Owned};
use routex_codec::{HeadBlockExtractor, Metadata, MetadataExtractor, HEAD_LIMIT};
use routex_dsa::RouteTrie;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything a router build reads besides the route itself.
///
/// Each collaborator is an explicit handle; builds share nothing through
/// process-wide state.
#[derive(Clone)]
pub struct BuildEnv {
    /// Base registry; every build works on its own clone.
    pub registry: EngineRegistry,
    pub globals: Arc<Context>,
    pub queries: Arc<dyn QueryExecutor>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub enumerator: Arc<dyn FileEnumerator>,
    pub patterns: Arc<dyn PatternGenerator>,
    pub bundles: Arc<dyn BundleFactory>,
}

impl BuildEnv {
    /// Default collaborators around `registry`, with no globals and data
    /// queries answered from `./data`.
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            registry,
            globals: Arc::new(Context::new()),
            queries: Arc::new(JsonDataExecutor::new("data")),
            extractor: Arc::new(HeadBlockExtractor),
            enumerator: Arc::new(WalkEnumerator),
            patterns: Arc::new(DefaultPatterns),
            bundles: Arc::new(ConcatBundles),
        }
    }

    /// Default collaborators configured from a site config: pipelines become
    /// engines, `vars` the globals, `data_dir` the query root.
    pub fn from_config(config: &SiteConfig) -> Self {
        let mut registry = EngineRegistry::new();
        for (ext, command) in &config.pipelines {
            registry.set_engine(ext.trim_start_matches('.'), Arc::new(PipelineEngine::new(command)));
        }
        Self {
            globals: Arc::new(config.vars.clone()),
            queries: Arc::new(JsonDataExecutor::new(&config.data_dir)),
            ..Self::new(registry)
        }
    }

    pub fn with_globals(mut self, globals: Context) -> Self {
        self.globals = Arc::new(globals);
        self
    }

    pub fn with_queries(mut self, queries: Arc<dyn QueryExecutor>) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_bundles(mut self, bundles: Arc<dyn BundleFactory>) -> Self {
        self.bundles = bundles;
        self
    }

    pub fn with_enumerator(mut self, enumerator: Arc<dyn FileEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }
}

/// The handlers of one mounted route, bound to their URL patterns.
///
/// Immutable once built; a source change produces a new router that replaces
/// this one inside its [`RouterCell`].
#[derive(Debug)]
pub struct Router {
    route: String,
    table: RouteTrie<Arc<Handler>>,
    registry: Arc<EngineRegistry>,
    extensions: BTreeSet<String>,
}

impl Router {
    /// Enumerates the route's files and binds one handler per file.
    ///
    /// Any metadata error or pattern collision fails the whole build.
    pub fn build(options: &RouteConfig, env: &BuildEnv) -> Result<Self> {
        let files = env.enumerator.map_files(options)?;

        // Engines are registered before any stage captures the registry.
        let mut registry = env.registry.clone();
        let mut extensions = BTreeSet::new();
        for file in &files {
            registry.add_engine(&file.extension);
            extensions.insert(file.extension.clone());
        }
        let registry = Arc::new(registry);

        let mut router = Self {
            route: options.route.clone(),
            table: RouteTrie::new(),
            registry,
            extensions,
        };
        for file in &files {
            router.add_file(options, file, env)?;
        }

        tracing::info!(
            "Router {}: {} files, {} patterns from {}",
            router.route,
            files.len(),
            router.table.len(),
            options.path.display()
        );
        Ok(router)
    }

    fn add_file(&mut self, options: &RouteConfig, file: &FileDescriptor, env: &BuildEnv) -> Result<()> {
        let mut tasks: Vec<Stage<Payload>> = Vec::with_capacity(2);
        let mut metadata = Metadata::default();

        if options.is_templated() && !file.is_bundle {
            let head = read_head(&file.path, HEAD_LIMIT)?;
            metadata = env
                .extractor
                .extract(&head)
                .map_err(|source| RoutexError::MetadataParse {
                    path: file.path.clone(),
                    source,
                })?;
            tasks.push(data_stage(metadata.data.clone(), env.globals.clone(), env.queries.clone()));
        }

        if file.is_bundle {
            tasks.push(bundle_stage(env.bundles.from_file(file, &options.kind)));
        } else {
            tasks.push(compile_stage(file.path.clone(), self.registry.clone()));
        }

        let render = RenderOptions {
            content_type: options.kind.clone(),
            query: metadata.query.clone(),
        };
        let patterns = env.patterns.patterns_for(&options.route, file, &render);
        let handler = Arc::new(Handler::new(file.path.clone(), &options.kind, metadata, tasks));

        for pattern in patterns {
            self.table
                .insert(&pattern, handler.clone())
                .map_err(|e| RoutexError::RouteCollision(e.to_string()))?;
            tracing::debug!("{} -> {}", pattern, file.path.display());
        }
        Ok(())
    }

    /// Finds the handler bound to `path` and its route parameters.
    pub fn resolve(&self, path: &str) -> Option<(Arc<Handler>, Context)> {
        let (handler, captures) = self.table.lookup(path)?;
        Some((handler.clone(), context::from_pairs(captures)))
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Distinct extensions met while enumerating the route's files.
    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.table.patterns()
    }
}

/// Holds the live router of a route and swaps in rebuilt ones.
///
/// Readers pin the current epoch, clone the `Arc` and release the guard, so a
/// request keeps the router it started with even if a swap lands mid-flight.
pub struct RouterCell {
    current: Atomic<Arc<Router>>,
}

impl RouterCell {
    pub fn new(router: Router) -> Self {
        Self {
            current: Atomic::new(Arc::new(router)),
        }
    }

    /// The router serving requests right now.
    pub fn load(&self) -> Arc<Router> {
        let guard = epoch::pin();
        let shared = self.current.load(Ordering::Acquire, &guard);
        // # Safety: the pointer is only ever replaced by `swap`, which installs
        // a non-null value and defers destruction of the old one past every
        // pinned reader. It becomes null only in `drop`, when no reader is left.
        let router = unsafe { shared.deref() };
        router.clone()
    }

    /// Installs `router`; in-flight requests finish on the previous one.
    pub fn swap(&self, router: Router) {
        let guard = epoch::pin();
        let old = self
            .current
            .swap(Owned::new(Arc::new(router)), Ordering::AcqRel, &guard);
        // # Safety: `old` is unreachable from the cell now; pinned readers
        // still holding it are covered by the deferred destruction.
        unsafe {
            if !old.is_null() {
                guard.defer_destroy(old);
            }
        }
    }
}

impl Drop for RouterCell {
    fn drop(&mut self) {
        let guard = epoch::pin();
        let old = self.current.swap(epoch::Shared::null(), Ordering::AcqRel, &guard);
        // # Safety: same argument as `swap`; `&mut self` rules out new readers.
        unsafe {
            if !old.is_null() {
                guard.defer_destroy(old);
            }
        }
    }
}

static_assertions::assert_impl_all!(Router: Send, Sync);
static_assertions::assert_impl_all!(RouterCell: Send, Sync);

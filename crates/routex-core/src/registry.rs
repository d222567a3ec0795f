use crate::context::Context;
use crate::engine::{CompileCallback, Engine, PassthroughEngine};
use crate::error::{Result, RoutexError};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Extension of `path` as the registry keys it (no leading dot).
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Maps file extensions to their compiler.
///
/// ## Lifecycle
/// A registry is filled during router construction and then frozen behind an
/// `Arc`; requests only read it. A rebuild clones the configured base
/// registry and builds a new router around the clone, so a live registry is
/// never written to.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn Engine>>,
    fallback: Arc<dyn Engine>,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("extensions", &self.engines.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::with_default(Arc::new(PassthroughEngine))
    }

    /// A registry whose auto-registered engine is `fallback`.
    pub fn with_default(fallback: Arc<dyn Engine>) -> Self {
        Self {
            engines: BTreeMap::new(),
            fallback,
        }
    }

    pub fn has_engine(&self, ext: &str) -> bool {
        self.engines.contains_key(ext)
    }

    /// Registers the default engine for `ext` unless one already exists.
    /// Returns whether a registration happened.
    pub fn add_engine(&mut self, ext: &str) -> bool {
        if self.has_engine(ext) {
            return false;
        }
        tracing::debug!("EngineRegistry: default engine for {:?}", ext);
        self.engines.insert(ext.to_string(), self.fallback.clone());
        true
    }

    /// Registers `engine` for `ext`, replacing any previous one.
    pub fn set_engine(&mut self, ext: &str, engine: Arc<dyn Engine>) {
        self.engines.insert(ext.to_string(), engine);
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Compiles `path` with the engine registered for its extension.
    ///
    /// Resolves exactly once: with the engine's body, with its error, or with
    /// [`RoutexError::EngineDropped`] if the engine never answered.
    pub async fn compile_file(&self, path: &Path, context: &Context) -> Result<Bytes> {
        let ext = extension_of(path);
        let engine = self
            .engines
            .get(&ext)
            .cloned()
            .ok_or(RoutexError::UnknownEngine(ext))?;

        let (tx, rx) = oneshot::channel();
        engine.compile(path, context, CompileCallback::new(tx));

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RoutexError::EngineDropped(path.to_path_buf())),
        }
    }
}

static_assertions::assert_impl_all!(EngineRegistry: Send, Sync);

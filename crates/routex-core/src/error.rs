use routex_codec::MetadataError;
use std::path::PathBuf;

pub type Result<T, E = RoutexError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum RoutexError {
    /// Compilation attempted for an extension with no registered engine.
    #[error("no engine registered for extension {0:?}")]
    UnknownEngine(String),
    #[error("engine failed to compile {path}: {reason}")]
    Compile { path: PathBuf, reason: String },
    /// The engine dropped its completion callback without answering.
    #[error("engine never completed compilation of {0}")]
    EngineDropped(PathBuf),
    #[error("bad metadata in {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },
    #[error("bundle {path} failed: {reason}")]
    Bundle { path: PathBuf, reason: String },
    #[error("data query {query:?} failed: {reason}")]
    Query { query: String, reason: String },
    /// A stage received a value it cannot work on.
    #[error("pipeline stage failed: {0}")]
    Stage(String),
    #[error("route collision: {0}")]
    RouteCollision(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("watch failed: {0}")]
    Watch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for RoutexError {
    fn from(e: toml::de::Error) -> Self {
        RoutexError::Config(e.to_string())
    }
}

pub mod bundler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod files;
pub mod handler;
pub mod pattern;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod router;
pub mod session;

pub use bundler::{BundleFactory, Bundler, ConcatBundler, ConcatBundles};
pub use config::{RouteConfig, ServerConfig, SiteConfig};
pub use context::{Context, Payload};
pub use engine::{CompileCallback, Engine, PassthroughEngine, PipelineEngine};
pub use error::{Result, RoutexError};
pub use files::{FileDescriptor, FileEnumerator, WalkEnumerator};
pub use handler::{Cookie, Handler, Request, Response};
pub use pattern::{DefaultPatterns, PatternGenerator, RenderOptions};
pub use pipeline::{sequence, stage, Stage};
pub use query::{JsonDataExecutor, QueryExecutor};
pub use registry::EngineRegistry;
pub use router::{BuildEnv, Router, RouterCell};
pub use session::Session;

pub use routex_codec::{DataQuery, Metadata};

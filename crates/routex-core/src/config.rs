use crate::context::Context;
use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// One mounted source folder.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteConfig {
    /// URL prefix the folder's patterns are generated under.
    pub route: String,
    /// Source folder.
    pub path: PathBuf,
    /// Declared output type (`html`, `css`, `js`, ...). Files of an `html`
    /// route are templated and carry metadata.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sub-folders served as one bundle each instead of file by file.
    #[serde(default)]
    pub bundles: Vec<String>,
}

impl RouteConfig {
    pub fn new(route: &str, path: impl Into<PathBuf>, kind: &str) -> Self {
        Self {
            route: route.to_string(),
            path: path.into(),
            kind: kind.to_string(),
            bundles: Vec::new(),
        }
    }

    pub fn with_bundles(mut self, bundles: &[&str]) -> Self {
        self.bundles = bundles.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn is_templated(&self) -> bool {
        self.kind == "html"
    }
}

/// Site configuration, usually read from `routex.toml`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub server: ServerConfig,
    /// Folder holding the JSON documents data queries read from.
    pub data_dir: PathBuf,
    /// Global variables, the lowest layer of every request context.
    pub vars: Context,
    /// Extension -> shell pipeline compiling files of that extension.
    pub pipelines: BTreeMap<String, String>,
    pub routes: Vec<RouteConfig>,
    /// Rebuild routes when their sources change.
    pub watch: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: PathBuf::from("data"),
            vars: Context::new(),
            pipelines: BTreeMap::new(),
            routes: vec![RouteConfig::new("/", "views", "html")],
            watch: true,
        }
    }
}

impl SiteConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, resolving relative folders against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        tracing::info!("Loaded site config from {}", path.display());
        Ok(config)
    }

    /// Like [`SiteConfig::load`], falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    fn rebase(&mut self, base: &Path) {
        if self.data_dir.is_relative() {
            self.data_dir = base.join(&self.data_dir);
        }
        for route in &mut self.routes {
            if route.path.is_relative() {
                route.path = base.join(&route.path);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for route in &self.routes {
            if !route.route.starts_with('/') {
                return Err(crate::RoutexError::Config(format!(
                    "route prefix {:?} must start with '/'",
                    route.route
                )));
            }
            if route.kind.is_empty() {
                return Err(crate::RoutexError::Config(format!(
                    "route {:?} has no type",
                    route.route
                )));
            }
        }
        Ok(())
    }
}

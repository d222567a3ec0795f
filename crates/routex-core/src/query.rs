use crate::context::Context;
use crate::error::{Result, RoutexError};
use futures::future::BoxFuture;
use routex_codec::DataQuery;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Runs a file's declared data queries for one request.
pub trait QueryExecutor: Send + Sync {
    /// Resolves to a context holding one entry per query, keyed by
    /// [`DataQuery::key`].
    fn queries(&self, queries: &[DataQuery], context: &Context) -> BoxFuture<'static, Result<Context>>;
}

/// Answers queries from JSON documents under a data folder.
///
/// A query source is a `/`-separated path relative to the folder, without
/// the `.json` suffix. Segments of the form `:name` are replaced by the
/// `name` entry of the request context, so `posts/:id` with `id = "7"`
/// reads `posts/7.json`.
#[derive(Debug, Clone)]
pub struct JsonDataExecutor {
    root: PathBuf,
}

impl JsonDataExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, query: &DataQuery, context: &Context) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in query.source.split('/').filter(|s| !s.is_empty()) {
            let segment = match segment.strip_prefix(':') {
                Some(name) => {
                    let value = context.get(name).ok_or_else(|| RoutexError::Query {
                        query: query.source.clone(),
                        reason: format!("context has no {:?}", name),
                    })?;
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
                        return Err(RoutexError::Query {
                            query: query.source.clone(),
                            reason: format!("refusing path segment {:?}", value),
                        });
                    }
                    value
                }
                None => segment.to_string(),
            };
            path.push(segment);
        }
        let mut file = path.into_os_string();
        file.push(".json");
        Ok(PathBuf::from(file))
    }
}

impl QueryExecutor for JsonDataExecutor {
    fn queries(&self, queries: &[DataQuery], context: &Context) -> BoxFuture<'static, Result<Context>> {
        let located: Result<Vec<(DataQuery, PathBuf)>> = queries
            .iter()
            .map(|q| Ok((q.clone(), self.locate(q, context)?)))
            .collect();

        Box::pin(async move {
            let mut result = Context::new();
            for (query, path) in located? {
                let text = tokio::fs::read(&path).await.map_err(|e| RoutexError::Query {
                    query: query.source.clone(),
                    reason: format!("{}: {}", path.display(), e),
                })?;
                let value: Value = serde_json::from_slice(&text).map_err(|e| RoutexError::Query {
                    query: query.source.clone(),
                    reason: e.to_string(),
                })?;
                result.insert(query.key, value);
            }
            Ok(result)
        })
    }
}

//! Ordered asynchronous stages and the stages a file route is made of.

use crate::bundler::Bundler;
use crate::context::{self, Context, Payload};
use crate::error::{Result, RoutexError};
use crate::query::QueryExecutor;
use crate::registry::EngineRegistry;
use futures::future::BoxFuture;
use routex_codec::DataQuery;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

pub type StageFuture<T> = BoxFuture<'static, Result<T>>;

/// One step of a pipeline: takes the previous value, resolves to the next.
pub type Stage<T> = Arc<dyn Fn(T) -> StageFuture<T> + Send + Sync>;

/// Wraps an async closure into a [`Stage`].
pub fn stage<T, F, Fut>(f: F) -> Stage<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)))
}

/// Runs `tasks` in order, feeding each stage the value the previous one
/// resolved to.
///
/// An empty list resolves to `initial`. The first failing stage ends the
/// run with its error; later stages are never invoked.
pub async fn sequence<T>(tasks: &[Stage<T>], initial: T) -> Result<T> {
    let mut value = initial;
    for task in tasks {
        value = task(value).await?;
    }
    Ok(value)
}

/// Builds the request context: `globals`, then the incoming context, then
/// the results of `queries` (run with the incoming context).
///
/// The merge happens even without queries, so every request context carries
/// the globals.
pub fn data_stage(
    queries: Vec<DataQuery>,
    globals: Arc<Context>,
    executor: Arc<dyn QueryExecutor>,
) -> Stage<Payload> {
    let queries = Arc::new(queries);
    stage(move |payload: Payload| {
        let queries = queries.clone();
        let globals = globals.clone();
        let executor = executor.clone();
        async move {
            let input = payload
                .into_context()
                .ok_or_else(|| RoutexError::Stage("data stage received a compiled body".into()))?;

            let queried = if queries.is_empty() {
                Context::new()
            } else {
                executor.queries(&queries, &input).await?
            };
            Ok(Payload::Context(context::merge([&*globals, &input, &queried])))
        }
    })
}

/// Compiles `path` through the registry with the incoming context.
pub fn compile_stage(path: PathBuf, registry: Arc<EngineRegistry>) -> Stage<Payload> {
    let path = Arc::new(path);
    stage(move |payload: Payload| {
        let path = path.clone();
        let registry = registry.clone();
        async move {
            let context = payload
                .into_context()
                .ok_or_else(|| RoutexError::Stage(format!("{} was compiled twice", path.display())))?;
            let body = registry.compile_file(&path, &context).await?;
            Ok(Payload::Body(body))
        }
    })
}

/// Serves the bundle's artifact; the incoming context is not used.
pub fn bundle_stage(bundle: Arc<dyn Bundler>) -> Stage<Payload> {
    stage(move |_payload: Payload| {
        let bundle = bundle.clone();
        async move { Ok(Payload::Body(bundle.get().await?)) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stages_run_in_order() {
        let tasks: Vec<Stage<Vec<u32>>> = (1..=3)
            .map(|n| {
                stage(move |mut acc: Vec<u32>| async move {
                    acc.push(n);
                    Ok(acc)
                })
            })
            .collect();
        assert_eq!(sequence(&tasks, vec![]).await.unwrap(), vec![1, 2, 3]);
    }
}

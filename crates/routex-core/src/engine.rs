use crate::context::Context;
use crate::error::{Result, RoutexError};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::sync::oneshot;

/// Completion callback handed to an [`Engine`].
///
/// Consumed by [`CompileCallback::complete`], so it answers at most once; an
/// engine that drops it without answering fails the compilation. Long-running
/// engines watch [`CompileCallback::closed`] to stop once nobody waits for
/// the result.
#[derive(Debug)]
pub struct CompileCallback {
    tx: oneshot::Sender<Result<Bytes>>,
}

impl CompileCallback {
    pub(crate) fn new(tx: oneshot::Sender<Result<Bytes>>) -> Self {
        Self { tx }
    }

    pub fn complete(self, result: Result<Bytes>) {
        // The caller may be gone already; the result is then discarded.
        let _ = self.tx.send(result);
    }

    /// Resolves when the caller stopped waiting (request cancelled).
    pub async fn closed(&mut self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A per-extension compiler.
///
/// Engines report through a callback so that thread-pool or process based
/// compilers can answer from wherever they finish. Callers never see this
/// contract: [`crate::EngineRegistry::compile_file`] turns it into a future.
pub trait Engine: Send + Sync {
    fn compile(&self, path: &Path, context: &Context, done: CompileCallback);
}

/// Serves the file as is. Registered for every extension nothing else claims.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEngine;

impl Engine for PassthroughEngine {
    fn compile(&self, path: &Path, _context: &Context, done: CompileCallback) {
        let path = path.to_path_buf();
        tokio::spawn(async move {
            let result = tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(RoutexError::from);
            done.complete(result);
        });
    }
}

/// Compiles by piping the file through a shell command.
///
/// The command reads the source on stdin and writes the output on stdout.
/// `ROUTEX_FILE` holds the source path and `ROUTEX_CONTEXT` the request
/// context as JSON. The child process is killed as soon as the caller stops
/// waiting for it.
#[derive(Debug, Clone)]
pub struct PipelineEngine {
    command: String,
}

impl PipelineEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(command: String, path: PathBuf, context: String) -> Result<Bytes> {
        let source = tokio::fs::File::open(&path).await?.into_std().await;
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env("ROUTEX_FILE", &path)
            .env("ROUTEX_CONTEXT", context)
            .stdin(Stdio::from(source))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RoutexError::Compile {
                path,
                reason: format!(
                    "`{}` exited with {}: {}",
                    command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(Bytes::from(output.stdout))
    }
}

impl Engine for PipelineEngine {
    fn compile(&self, path: &Path, context: &Context, mut done: CompileCallback) {
        let command = self.command.clone();
        let path = path.to_path_buf();
        let context = match serde_json::to_string(context) {
            Ok(json) => json,
            Err(e) => return done.complete(Err(e.into())),
        };
        tokio::spawn(async move {
            // Dropping `run` drops the child, which `kill_on_drop` terminates.
            let outcome = tokio::select! {
                result = Self::run(command, path.clone(), context) => Some(result),
                _ = done.closed() => None,
            };
            match outcome {
                Some(result) => done.complete(result),
                None => tracing::debug!("{}: compilation abandoned", path.display()),
            }
        });
    }
}

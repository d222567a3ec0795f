//! # Core Layer Tests: EngineRegistry
//!
//! Validates idempotent registration, explicit failure for unknown
//! extensions, and the single-resolution wrapping of callback engines.

use bytes::Bytes;
use routex_core::{CompileCallback, Context, Engine, EngineRegistry, RoutexError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Answers with the path it was asked to compile.
struct EchoEngine;

impl Engine for EchoEngine {
    fn compile(&self, path: &Path, _context: &Context, done: CompileCallback) {
        done.complete(Ok(Bytes::from(format!("compiled:{}", path.display()))));
    }
}

/// Never calls its callback.
struct SilentEngine;

impl Engine for SilentEngine {
    fn compile(&self, _path: &Path, _context: &Context, _done: CompileCallback) {}
}

/// Fails from another task.
struct FailingEngine(Arc<AtomicUsize>);

impl Engine for FailingEngine {
    fn compile(&self, path: &Path, _context: &Context, done: CompileCallback) {
        self.0.fetch_add(1, Ordering::SeqCst);
        let path = path.to_path_buf();
        tokio::spawn(async move {
            done.complete(Err(RoutexError::Compile {
                path,
                reason: "syntax error".into(),
            }));
        });
    }
}

/// Verifies that `add_engine` registers once and `has_engine` tracks it.
#[test]
fn test_add_engine_is_idempotent() {
    let t = Instant::now();

    let mut registry = EngineRegistry::new();
    assert!(!registry.has_engine("xyz"));

    assert!(registry.add_engine("xyz"), "first call registers");
    assert!(registry.has_engine("xyz"));

    assert!(!registry.add_engine("xyz"), "second call is a no-op");
    assert!(registry.has_engine("xyz"));
    assert_eq!(registry.extensions().filter(|e| *e == "xyz").count(), 1);

    println!("test_add_engine_is_idempotent: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that `add_engine` keeps an explicitly configured engine.
#[tokio::test]
async fn test_add_engine_keeps_existing() {
    let mut registry = EngineRegistry::new();
    registry.set_engine("md", Arc::new(EchoEngine));
    assert!(!registry.add_engine("md"));

    let body = registry
        .compile_file(Path::new("/site/post.md"), &Context::new())
        .await
        .unwrap();
    assert_eq!(body, Bytes::from("compiled:/site/post.md"));
}

/// Verifies that compiling an unregistered extension fails explicitly.
#[tokio::test]
async fn test_unknown_engine_fails() {
    let t = Instant::now();

    let registry = EngineRegistry::new();
    let err = registry
        .compile_file(Path::new("/site/page.xyz"), &Context::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RoutexError::UnknownEngine(ref ext) if ext == "xyz"));

    println!("test_unknown_engine_fails: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies that an engine error resolves the compilation exactly once.
#[tokio::test]
async fn test_engine_error_is_forwarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = EngineRegistry::new();
    registry.set_engine("scss", Arc::new(FailingEngine(calls.clone())));

    let err = registry
        .compile_file(Path::new("/site/main.scss"), &Context::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RoutexError::Compile { ref reason, .. } if reason == "syntax error"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Verifies that an engine dropping its callback still resolves (as an error).
#[tokio::test]
async fn test_dropped_callback_resolves() {
    let mut registry = EngineRegistry::new();
    registry.set_engine("txt", Arc::new(SilentEngine));

    let err = registry
        .compile_file(Path::new("/site/notes.txt"), &Context::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RoutexError::EngineDropped(_)));
}

/// Verifies that the default engine serves the file verbatim.
#[tokio::test]
async fn test_passthrough_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.xyz");
    std::fs::write(&path, "<p>hi</p>").unwrap();

    let mut registry = EngineRegistry::new();
    registry.add_engine("xyz");
    let body = registry.compile_file(&path, &Context::new()).await.unwrap();
    assert_eq!(body, Bytes::from_static(b"<p>hi</p>"));
}

/// Verifies that a cloned registry is independent from its base.
#[test]
fn test_clone_does_not_leak_registrations() {
    let base = EngineRegistry::new();
    let mut build = base.clone();
    build.add_engine("xyz");
    assert!(build.has_engine("xyz"));
    assert!(!base.has_engine("xyz"));
}

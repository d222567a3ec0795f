use crate::error::{Result, RoutexError};
use crate::files::FileDescriptor;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use walkdir::WalkDir;

/// A precompiled artifact served in place of per-file compilation.
pub trait Bundler: Send + Sync {
    fn get(&self) -> BoxFuture<'static, Result<Bytes>>;
}

/// Creates the bundler of a bundle-mode file.
pub trait BundleFactory: Send + Sync {
    fn from_file(&self, file: &FileDescriptor, content_type: &str) -> Arc<dyn Bundler>;
}

/// Joins every file of a bundle folder, in path order, separated by a newline.
///
/// The artifact is built on first request and kept for the lifetime of the
/// bundler; a rebuild of the owning router creates a fresh bundler.
pub struct ConcatBundler {
    state: Arc<ConcatState>,
}

struct ConcatState {
    dir: PathBuf,
    artifact: OnceCell<Bytes>,
}

impl ConcatBundler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(ConcatState {
                dir: dir.into(),
                artifact: OnceCell::new(),
            }),
        }
    }
}

fn concat_dir(dir: PathBuf) -> Result<Bytes> {
    let mut out = BytesMut::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RoutexError::Bundle {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let bytes = std::fs::read(entry.path())?;
        out.extend_from_slice(&bytes);
        if !bytes.ends_with(b"\n") {
            out.extend_from_slice(b"\n");
        }
    }
    Ok(out.freeze())
}

impl Bundler for ConcatBundler {
    fn get(&self) -> BoxFuture<'static, Result<Bytes>> {
        let state = self.state.clone();
        Box::pin(async move {
            let artifact = state
                .artifact
                .get_or_try_init(|| async {
                    let dir = state.dir.clone();
                    tokio::task::spawn_blocking(move || concat_dir(dir))
                        .await
                        .map_err(|e| RoutexError::Bundle {
                            path: state.dir.clone(),
                            reason: e.to_string(),
                        })?
                })
                .await?;
            Ok(artifact.clone())
        })
    }
}

/// Hands out a [`ConcatBundler`] per bundle folder.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatBundles;

impl BundleFactory for ConcatBundles {
    fn from_file(&self, file: &FileDescriptor, _content_type: &str) -> Arc<dyn Bundler> {
        Arc::new(ConcatBundler::new(&file.path))
    }
}

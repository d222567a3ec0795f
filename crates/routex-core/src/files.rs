use crate::config::RouteConfig;
use crate::error::Result;
use crate::registry::extension_of;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One servable unit of a route: a source file, or a bundle folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// Path relative to the route's source folder, `/`-separated.
    pub relative: String,
    /// Extension of the file; for bundles, the route's output type.
    pub extension: String,
    pub is_bundle: bool,
}

impl FileDescriptor {
    /// `relative` without its extension.
    pub fn stem(&self) -> &str {
        if self.is_bundle || self.extension.is_empty() {
            return &self.relative;
        }
        self.relative
            .strip_suffix(&self.extension)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&self.relative)
    }
}

pub trait FileEnumerator: Send + Sync {
    /// Lists the descriptors of `options.path`, in a stable order.
    fn map_files(&self, options: &RouteConfig) -> Result<Vec<FileDescriptor>>;
}

/// Walks the source folder in file-name order. Hidden entries are skipped;
/// folders listed in `bundles` become a single bundle descriptor.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkEnumerator;

fn relative_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl FileEnumerator for WalkEnumerator {
    fn map_files(&self, options: &RouteConfig) -> Result<Vec<FileDescriptor>> {
        let root = &options.path;
        let mut files = Vec::new();
        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop while walking sources"))
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            let relative = relative_of(root, entry.path());
            if entry.file_type().is_dir() {
                if options.bundles.iter().any(|b| b.trim_matches('/') == relative) {
                    files.push(FileDescriptor {
                        path: entry.path().to_path_buf(),
                        relative,
                        extension: options.kind.clone(),
                        is_bundle: true,
                    });
                    walker.skip_current_dir();
                }
                continue;
            }

            files.push(FileDescriptor {
                path: entry.path().to_path_buf(),
                extension: extension_of(entry.path()),
                relative,
                is_bundle: false,
            });
        }

        tracing::debug!("{}: {} descriptors", root.display(), files.len());
        Ok(files)
    }
}

/// Reads at most `limit` bytes from the start of `path`.
pub fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut head = Vec::with_capacity(limit);
    file.take(limit as u64).read_to_end(&mut head)?;
    Ok(head)
}

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use routex_core::{Result, RoutexError};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Called on every relevant change; carries no payload.
pub type OnChange = Arc<dyn Fn() + Send + Sync>;

/// Source change notifications.
pub trait Watch: Send + Sync {
    /// Calls `on_change` whenever a file with `extension` changes under `path`.
    fn subscribe(&self, path: &Path, extension: &str, on_change: OnChange) -> Result<()>;
}

/// [`Watch`] backed by the platform's file notification API.
///
/// Every subscription owns one OS watcher, kept alive as long as this value.
#[derive(Default)]
pub struct NotifyWatch {
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl NotifyWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriptions(&self) -> usize {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Watch for NotifyWatch {
    fn subscribe(&self, path: &Path, extension: &str, on_change: OnChange) -> Result<()> {
        let wanted = extension.to_string();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("watch error: {}", e);
                    return;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let relevant = event
                .paths
                .iter()
                .any(|p| p.extension() == Some(OsStr::new(&wanted)));
            if relevant {
                on_change();
            }
        })
        .map_err(|e| RoutexError::Watch(e.to_string()))?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| RoutexError::Watch(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Watching *.{} under {}", extension, path.display());
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);
        Ok(())
    }
}

use crate::watch::Watch;
use routex_core::{BuildEnv, Request, Response, Result, RouteConfig, Router, RouterCell, SiteConfig};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

struct Mount {
    options: RouteConfig,
    cell: RouterCell,
    /// Extensions already subscribed for this route.
    watched: Mutex<BTreeSet<String>>,
    /// Serialises rebuilds of this route.
    rebuild: Mutex<()>,
}

/// Every mounted route of a site, in configuration order.
///
/// Requests go to the first route whose router binds the path. Each route's
/// router lives in its own [`RouterCell`] and is rebuilt independently.
pub struct Site {
    env: BuildEnv,
    mounts: Vec<Mount>,
    watch: OnceLock<Arc<dyn Watch>>,
}

impl Site {
    /// Builds one router per route. The first failing route fails the site.
    pub fn build(routes: Vec<RouteConfig>, env: BuildEnv) -> Result<Arc<Self>> {
        let mut mounts = Vec::with_capacity(routes.len());
        for options in routes {
            let router = Router::build(&options, &env)?;
            mounts.push(Mount {
                options,
                cell: RouterCell::new(router),
                watched: Mutex::new(BTreeSet::new()),
                rebuild: Mutex::new(()),
            });
        }
        Ok(Arc::new(Self {
            env,
            mounts,
            watch: OnceLock::new(),
        }))
    }

    pub fn from_config(config: &SiteConfig) -> Result<Arc<Self>> {
        Self::build(config.routes.clone(), BuildEnv::from_config(config))
    }

    /// Live routers, in mount order.
    pub fn routers(&self) -> Vec<Arc<Router>> {
        self.mounts.iter().map(|m| m.cell.load()).collect()
    }

    /// Subscribes once per (route, extension) and rebuilds a route whenever
    /// one of its sources changes. Later calls are ignored.
    pub fn watch_with(self: &Arc<Self>, watch: Arc<dyn Watch>) -> Result<()> {
        if self.watch.set(watch).is_err() {
            tracing::warn!("Site is already watched");
            return Ok(());
        }
        for index in 0..self.mounts.len() {
            self.subscribe_new(index)?;
        }
        Ok(())
    }

    fn subscribe_new(self: &Arc<Self>, index: usize) -> Result<()> {
        let Some(watch) = self.watch.get() else {
            return Ok(());
        };
        let mount = &self.mounts[index];
        let router = mount.cell.load();
        let mut watched = mount.watched.lock().unwrap_or_else(PoisonError::into_inner);

        for ext in router.extensions() {
            if watched.contains(ext) {
                continue;
            }
            let site: Weak<Self> = Arc::downgrade(self);
            watch.subscribe(
                &mount.options.path,
                ext,
                Arc::new(move || {
                    if let Some(site) = site.upgrade() {
                        site.on_change(index);
                    }
                }),
            )?;
            watched.insert(ext.clone());
        }
        Ok(())
    }

    fn on_change(self: &Arc<Self>, index: usize) {
        let route = &self.mounts[index].options.route;
        match self.rebuild(index) {
            Ok(()) => {
                if let Err(e) = self.subscribe_new(index) {
                    tracing::warn!("Route {}: could not watch new extensions: {}", route, e);
                }
            }
            Err(e) => tracing::error!("Route {}: rebuild failed, keeping previous router: {}", route, e),
        }
    }

    /// Rebuilds route `index` from its sources and swaps the result in.
    /// On failure the current router stays live.
    pub fn rebuild(&self, index: usize) -> Result<()> {
        let mount = &self.mounts[index];
        let _serial = mount.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let router = Router::build(&mount.options, &self.env)?;
        mount.cell.swap(router);
        tracing::info!("Route {} rebuilt", mount.options.route);
        Ok(())
    }

    /// Serves `request` from the first route binding its path; 404 otherwise.
    pub async fn dispatch(&self, request: &mut Request) -> Response {
        let path = request.path.split(['?', '#']).next().unwrap_or("/").to_string();

        for mount in &self.mounts {
            let router = mount.cell.load();
            if let Some((handler, params)) = router.resolve(&path) {
                request.params = params;
                return handler.handle(request).await;
            }
        }

        tracing::warn!("No route for {}", path);
        Response::with_status(404)
    }
}

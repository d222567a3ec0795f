pub use routex_core::{Request, Response, RouteConfig, SiteConfig};
pub mod dispatcher;
pub mod server;
pub mod stream;
pub mod watch;

pub use dispatcher::Site;
pub use server::SiteServer;
pub use watch::{NotifyWatch, OnChange, Watch};

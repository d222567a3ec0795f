use clap::{Parser, Subcommand};
use routex_core::SiteConfig;
use routex_transport::{NotifyWatch, Site, SiteServer};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "routex", version, about = "Serve a source tree, compiling files on request")]
struct Cli {
    /// Site configuration file.
    #[arg(short, long, global = true, default_value = "routex.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server.
    Start {
        /// Do not rebuild routes when sources change.
        #[arg(long)]
        no_watch: bool,
    },
    /// Print every bound URL pattern.
    Routes,
}

fn listen_addr(config: &SiteConfig) -> std::io::Result<SocketAddr> {
    (config.server.host.as_str(), config.server.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::other(format!("cannot resolve {}", config.server.host)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SiteConfig::load_or_default(&cli.config)?;
    let site = Site::from_config(&config)?;

    match cli.command {
        Command::Routes => {
            for router in site.routers() {
                println!("{}", router.route());
                for pattern in router.patterns() {
                    println!("    {}", pattern);
                }
            }
        }
        Command::Start { no_watch } => {
            tracing::info!("{} route(s) mounted", site.routers().len());
            if config.watch && !no_watch {
                site.watch_with(Arc::new(NotifyWatch::new()))?;
            }
            SiteServer::bind(listen_addr(&config)?, site).await?.run().await?;
        }
    }
    Ok(())
}

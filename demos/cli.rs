//! Runs the proxy from the command line.
//!
//! ```text
//! cargo run --example cli -- --port 8080
//! ```

use clap::Parser;
use dns_prefetch_proxy::{RelayOpts, relay_accept_loop};
use n0_error::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    port: u16,
    /// Disable DNS prefetching of link targets.
    #[clap(long)]
    no_prefetch: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Fatal error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let opts = if cli.no_prefetch {
        RelayOpts::default()
    } else {
        RelayOpts::with_system_resolver()
    };
    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    info!("listening on {}", listener.local_addr()?);
    relay_accept_loop(listener, opts).await
}

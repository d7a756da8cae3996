//! DDARP node binary: loads configuration, starts the composite node's
//! tick loops, and shuts down gracefully on Ctrl-C (spec.md §4.5, §5).

mod composite;
mod driver;
mod health;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use composite::CompositeNode;
use ddarp_config::DaemonConfig;
use driver::NoopDriver;

#[derive(Parser)]
#[command(name = "ddarp-node")]
#[command(about = "Distributed Adaptive Routing Daemon node")]
struct Args {
    /// Path to the node's TOML configuration file.
    #[arg(long, default_value = "ddarp.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = DaemonConfig::from_file(&args.config)?;
    info!(node_id = %config.node_id, "starting DDARP node");

    // Startup order: Data-Plane Bridge -> OWL Engine -> tick loops
    // (spec.md §4.5). Both are constructed inside `CompositeNode::new`.
    let driver = Arc::new(NoopDriver);
    let node = CompositeNode::new(config, driver).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);

    let run_handle = {
        let node = node.clone();
        tokio::spawn(async move { node.run(cancel_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");

    let _ = cancel_tx.send(true);
    node.shutdown().await;
    let _ = run_handle.await;

    info!("shutdown complete");
    Ok(())
}

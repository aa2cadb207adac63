mod config;
mod fabric;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info};

use config::FabricConfig;
use fabric::Fabric;

/// Coordinates the lifecycle of a single A2A fabric node: load settings, bring every subsystem
/// up in dependency order, run until asked to stop, then tear the background work back down.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("a2a_fabric=info".parse()?))
        .json()
        .init();

    info!("starting A2A coordination fabric node");

    let config = FabricConfig::load()?;

    let fabric = match Fabric::new(config).await {
        Ok(fabric) => {
            info!("fabric initialized successfully");
            fabric
        }
        Err(e) => {
            error!("failed to initialize fabric: {}", e);
            return Err(e);
        }
    };

    if let Err(e) = fabric.start().await {
        error!("failed to start fabric: {}", e);
        return Err(e);
    }

    info!(node_id = %fabric.node_id, "fabric node running");

    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping fabric..."),
        Err(err) => error!("unable to listen for shutdown signal: {}", err),
    }

    if let Err(e) = fabric.stop().await {
        error!("error during fabric shutdown: {}", e);
        return Err(e);
    }

    info!("fabric node stopped successfully");
    Ok(())
}

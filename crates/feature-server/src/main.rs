//! On-Demand Feature Server - Main Entry Point

use feature_model::TransformRegistry;
use feature_server::{init_logging, run_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional config file path as the only argument
    let path = std::env::args().nth(1);
    let config = ServerConfig::load(path.as_deref())?;
    init_logging(&config)?;

    info!("=== On-Demand Feature Server v{} ===", env!("CARGO_PKG_VERSION"));

    run_server(config, TransformRegistry::new()).await
}

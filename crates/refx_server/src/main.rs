use anyhow::anyhow;
use clap::Parser;
use refx_server::config::{load_config, Args};
use refx_server::logging::{bootstrap_dispatch, setup_logging};
use refx_server::{Application, Services};
use tracing::info;
use tracing::instrument::WithSubscriber;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)
        .with_subscriber(bootstrap_dispatch(&args))
        .await?;
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
    setup_logging(&config.logging)?;

    info!(
        "Starting refx v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    let services = Services::from_config(&config)?;
    Application::new(config, services).run().await
}

//! moments uploader entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,moments=debug")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting moments uploader");

    let config = config::Config::load(args.config.as_deref())?;
    tracing::debug!(
        host = %config.host.base_url,
        backend = %config.backend.base_url,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let failed = rt.block_on(app::run(config, args))?;

    if failed > 0 {
        anyhow::bail!("{failed} upload(s) failed");
    }
    Ok(())
}

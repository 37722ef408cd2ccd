// crates/cli/src/main.rs
//! bqops binary: parse arguments, connect the warehouse clients once, and
//! dispatch. Exit code 0 on success, 1 with the error on stderr otherwise.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bqops_cli::{App, Cli, Config};
use bqops_client::{GcpWarehouse, Warehouse};

#[tokio::main]
async fn main() -> Result<()> {
    // Quiet by default; BQOPS_LOG=debug opens it up. Command output itself
    // goes to stdout via println so it stays scriptable.
    let filter = EnvFilter::try_from_env("BQOPS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let warehouse = Arc::new(
        GcpWarehouse::connect(config.project.clone(), config.location.clone()).await?,
    );
    let project = warehouse.project().to_string();
    tracing::debug!(project = %project, backend = warehouse.name(), "Connected");

    let app = App::new(warehouse, project, &config).with_progress(true);
    app.dispatch(cli.command).await?;
    Ok(())
}

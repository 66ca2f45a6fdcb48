//! Entry point wiring CLI dispatch to the pipeline, server and history.

use anyhow::Result;
use patent_harvest::{cli::Cli, config::Settings, logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    logging::init_tracing(&settings.log_level)?;

    info!(?cli, "starting command");
    cli.dispatch(settings).await
}

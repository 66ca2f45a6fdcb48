//! Command-line interface wiring for patent-harvest.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod history;
pub mod run;
pub mod serve;
pub mod urls;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Patent metadata harvester", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Run(args) => run::run(args, settings).await,
            Commands::Serve(args) => serve::run(args, settings).await,
            Commands::History(args) => history::run(args, settings),
            Commands::Urls(args) => urls::run(args),
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch seeds, expand families, enrich and save the consolidated result.
    Run(run::Args),
    /// Serve the JSON API for background jobs and history.
    Serve(serve::Args),
    /// Inspect or prune the search history.
    History(history::Args),
    /// Print the Google Patents and PubChem URLs for identifiers.
    Urls(urls::Args),
}

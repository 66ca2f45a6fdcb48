//! CLI entry-point for the search history.

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Subcommand};

use crate::{config::Settings, history::HistoryStore};

#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// Show the most recent searches.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Remove one entry by id.
    Delete { id: u64 },
    /// Remove every entry.
    Clear,
    /// Drop entries older than the retention window.
    Cleanup {
        /// Defaults to HISTORY_RETENTION_DAYS.
        #[arg(long)]
        days: Option<i64>,
    },
}

pub fn run(args: Args, settings: Settings) -> Result<()> {
    let store = HistoryStore::from_settings(&settings);
    match args.action {
        Action::List { limit } => {
            for entry in store.list(limit)? {
                println!(
                    "{:>4}  {}  {:<8}  {}  {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.source_kind,
                    entry.display_name,
                    entry
                        .export_url
                        .or(entry.output_location)
                        .unwrap_or_default()
                );
            }
        }
        Action::Delete { id } => {
            if !store.delete(id)? {
                bail!("history entry {id} not found");
            }
            println!("deleted {id}");
        }
        Action::Clear => println!("removed {} entries", store.clear()?),
        Action::Cleanup { days } => {
            let days = days.unwrap_or(settings.history_retention_days);
            println!("removed {} entries", store.cleanup(days)?);
        }
    }
    Ok(())
}

use anyhow::Result;
use clap::Args as ClapArgs;

use crate::patents::derive_urls;

#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Patent identifiers such as WO-2024184281-A1.
    #[arg(required = true)]
    pub identifiers: Vec<String>,
}

pub fn run(args: Args) -> Result<()> {
    for identifier in &args.identifiers {
        let urls = derive_urls(identifier);
        println!("{identifier}\t{}\t{}", urls.google_patents, urls.pubchem);
    }
    Ok(())
}

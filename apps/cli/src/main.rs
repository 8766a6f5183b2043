//! NoteScout CLI: keyword search and note collection for Xiaohongshu.
//!
//! Pages through signed search results, fetches each note's detail, and
//! exports the flattened records to CSV or JSON lines.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

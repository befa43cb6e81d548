//! ChapterWatch CLI: weekly chapter detection and announcement.
//!
//! Checks the board for this week's chapter post, pulls the reading link out
//! of it and announces it to a Telegram channel.

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

mod cli;
mod config;
mod error;
mod i18n;
mod model;
mod ops;
mod orchestrator;
mod parser;
mod registry;
mod runner;
mod supervisor;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.command.is_some();

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 for one-shot subcommands; a rename
            // worker that already reported completion must not hold the
            // process open.
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

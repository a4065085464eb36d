//! coursebuild CLI: content build pipeline for the course web app.
//!
//! Reads the content source tree, validates it, compiles every atom and
//! writes the generated tree the web app serves from.

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

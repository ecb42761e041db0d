//! techtree CLI — build a tech-tree of steps, products, and prerequisites.
//!
//! Prerequisites are linked by searching earlier steps' titles and
//! products; the tree can be rendered as a Graphviz image.

mod commands;
mod prompt;

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

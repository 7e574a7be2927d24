mod args;
mod commands;

use anyhow::Result;
use args::{Args, Command};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Generate(cmd) => commands::generate::exec(cmd),
        Command::Explain(cmd) => commands::explain::exec(cmd),
    }
}

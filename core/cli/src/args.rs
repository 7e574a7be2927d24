use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(about, version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a synthetic UnixFS DAG for use in testing.
    Generate(GenerateArgs),
    /// Execute a trustless query across a DAG inside a CAR file and show the
    /// block traversal details.
    Explain(ExplainArgs),
}

#[derive(Parser)]
pub struct GenerateArgs {
    /// Descriptor of the DAG to build, e.g.
    /// dir(~5*file:1KB,2*dir{sharded}(~10*file:50KB),file:1GB{zero})
    pub descriptor: String,
    /// Seed for the random number generator.
    #[arg(long, default_value_t = 0)]
    pub seed: i64,
}

#[derive(Parser)]
pub struct ExplainArgs {
    /// CAR file to read from, if not supplied, the first unnamed argument
    /// will be used.
    #[arg(long)]
    pub car: Option<PathBuf>,
    /// Positional CAR file argument.
    #[arg(value_name = "CAR")]
    pub car_positional: Option<PathBuf>,
    /// Override the root CID of the CAR file or query.
    #[arg(long)]
    pub root: Option<String>,
    /// Path to query, required unless --query is specified.
    #[arg(long)]
    pub path: Option<String>,
    /// Scope of the query, one of: all, entity, block.
    #[arg(long, alias = "dag-scope")]
    pub scope: Option<String>,
    /// Byte range of the terminating entity if that entity is a sharded file,
    /// of the form `from:to`, where * is a valid `to` value and negative
    /// values are also valid.
    #[arg(long, alias = "entity-bytes")]
    pub bytes: Option<String>,
    /// Include duplicate blocks in the output.
    #[arg(
        long,
        alias = "dups",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub duplicates: Option<bool>,
    /// Print the full path of each block, not just the last path segment.
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub full_path: bool,
    /// Full query (e.g. /ipfs/bafy.../path?dag-scope=all&dups=n&entity-bytes=0:*),
    /// overridden by --path, --scope, --bytes and --duplicates if set.
    #[arg(long)]
    pub query: Option<String>,
    /// Ignore missing blocks in the CAR. Useful for when you have a partial
    /// CAR and want to do a full (path=/) listing to see what's in it.
    #[arg(long)]
    pub ignore_missing: bool,
}

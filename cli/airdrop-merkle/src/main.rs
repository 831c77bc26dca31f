#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod build_tree;
mod claim;
mod common;
mod verify;

#[derive(Parser, Debug)]
#[command(name = "airdrop-merkle")]
#[command(about = "Merkle tree tools for airdrop whitelists", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the tree and write the root and every entry's proof
    BuildTree(build_tree::Cli),
    /// Generate the claim proof for one or more whitelisted addresses
    Claim(claim::Cli),
    /// Check a claim file against a published root
    Verify(verify::Cli),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildTree(args) => build_tree::run(args)?,
        Commands::Claim(args) => claim::run(args)?,
        Commands::Verify(args) => verify::run(&args)?,
    }

    Ok(())
}

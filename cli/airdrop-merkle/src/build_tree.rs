use std::path::PathBuf;

use airdrop_merkle::report::TreeReport;
use airdrop_merkle::{hex_encode, write_file_atomic};
use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::common::WhitelistArgs;

#[derive(Args, Debug)]
#[command(about = "Build Merkle tree from a whitelist", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    whitelist: WhitelistArgs,

    /// Output file for Merkle root
    #[arg(short, long)]
    root_output: Option<PathBuf>,

    /// Output JSON file with every entry, its leaf index and its proof
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file for the tree nodes, one `level:index:hash` per line
    #[arg(short, long)]
    tree_output: Option<PathBuf>,
}

pub fn run(cli: Cli) -> Result<()> {
    let tree = cli.whitelist.load_tree()?;
    let root = hex_encode(tree.root());

    if let Some(root_path) = &cli.root_output {
        write_file_atomic(root_path, &format!("{}\n", root)).context("Failed to write root")?;
    }

    if let Some(output) = &cli.output {
        info!("Generating proofs for {} entries...", tree.len());
        let report = TreeReport::new(&tree).context("Failed to generate proofs")?;
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize JSON")?;
        info!("Writing proofs to {:?}...", output);
        write_file_atomic(output, &json).context("Failed to write proofs file")?;
    }

    if let Some(tree_path) = &cli.tree_output {
        info!("Writing Merkle tree to {:?}...", tree_path);
        write_file_atomic(tree_path, &tree.render()).context("Failed to write tree")?;
    }

    println!("Merkle root: {}", root);
    println!("Entries: {}", tree.len());
    println!("Depth: {}", tree.depth());
    Ok(())
}

use std::path::PathBuf;

use airdrop_merkle::source::{read_whitelist, InputFormat, DEFAULT_DECIMALS};
use airdrop_merkle::{hex_encode, MerkleTree, Schema};
use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

/// Where the whitelist comes from and how its amounts are read.
#[derive(Args, Debug)]
pub struct WhitelistArgs {
    /// Whitelist file: `address amount` lines, or a JSON array of {address, amount}
    #[arg(short, long)]
    pub input: PathBuf,

    /// Input file format
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// Token decimals used to convert amounts to base units
    #[arg(short, long, default_value_t = DEFAULT_DECIMALS)]
    pub decimals: u32,

    /// Bit width of the encoded amount field
    #[arg(long, default_value_t = 256)]
    pub amount_bits: u16,
}

impl WhitelistArgs {
    /// Reads the whitelist and builds its tree.
    pub fn load_tree(&self) -> Result<MerkleTree> {
        info!("Reading whitelist from {:?}...", self.input);
        let records = read_whitelist(&self.input, self.format, self.decimals)
            .context("Failed to read whitelist")?;
        info!("Total entries: {}", records.len());

        let schema =
            Schema::allocation_with_bits(self.amount_bits).context("Invalid amount width")?;
        info!("Building Merkle tree...");
        let tree = MerkleTree::build(schema, records.into_iter().map(|record| record.entry))
            .context("Failed to build Merkle tree")?;
        info!("Merkle root: {}", hex_encode(tree.root()));
        Ok(tree)
    }
}

use std::path::PathBuf;

use airdrop_merkle::report::{ClaimReport, MultiproofReport};
use airdrop_merkle::source::parse_address;
use airdrop_merkle::{hex_encode, write_file_atomic, Address, MerkleTree};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::common::WhitelistArgs;

#[derive(Args, Debug)]
#[command(about = "Generate airdrop claim proof", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    whitelist: WhitelistArgs,

    /// Claimer address; repeat to prove several entries with one multiproof
    #[arg(short, long = "address", required = true)]
    addresses: Vec<String>,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
}

pub fn run(cli: Cli) -> Result<()> {
    let addresses = cli
        .addresses
        .iter()
        .map(|s| {
            parse_address(s)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid claimer address '{}'", s))
        })
        .collect::<Result<Vec<Address>>>()?;

    let tree = cli.whitelist.load_tree()?;

    info!("Looking up addresses in the whitelist...");
    let indices = find_indices(&tree, &addresses)?;

    let claim = build_claim(&tree, &indices)?;
    match &claim {
        ClaimJson::Single(report) => {
            println!("Leaf index: {}", report.leaf_index);
            println!("Proof length: {} nodes", report.merkle_proof.len());
        }
        ClaimJson::Multi(report) => {
            println!("Leaf indices: {:?}", report.leaf_indices);
            println!(
                "Proof length: {} nodes, {} steps",
                report.proof.len(),
                report.proof_flags.len()
            );
        }
    }
    let json = serde_json::to_string_pretty(&claim).context("Failed to serialize JSON")?;

    info!("Writing claim JSON to {:?}...", cli.output);
    write_file_atomic(&cli.output, &json).context("Failed to write claim file")?;

    println!("Merkle root: {}", hex_encode(tree.root()));
    println!("Claim written to {:?}", cli.output);
    Ok(())
}

/// A single-entry claim, or one multiproof covering several entries.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ClaimJson {
    Single(ClaimReport),
    Multi(MultiproofReport),
}

/// Sorted leaf indices of every entry allocated to one of `addresses`.
///
/// An address listed with several amounts contributes each of its entries.
fn find_indices(tree: &MerkleTree, addresses: &[Address]) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for address in addresses {
        let before = indices.len();
        indices.extend(
            tree.entries()
                .filter(|(_, entry)| entry.address() == Some(address))
                .map(|(index, _)| index),
        );
        if indices.len() == before {
            anyhow::bail!("Address {} not found in qualified list", address);
        }
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

fn build_claim(tree: &MerkleTree, indices: &[usize]) -> Result<ClaimJson> {
    if let &[leaf_index] = indices {
        info!("Generating Merkle proof...");
        let proof = tree
            .prove_index(leaf_index)
            .context("Failed to generate Merkle proof")?;
        Ok(ClaimJson::Single(ClaimReport::new(tree, &proof)?))
    } else {
        info!("Generating Merkle multiproof for {} entries...", indices.len());
        let multiproof = tree
            .prove_indices(indices)
            .context("Failed to generate Merkle multiproof")?;
        Ok(ClaimJson::Multi(MultiproofReport::new(tree, &multiproof)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_merkle::{verify, verify_multiproof, Entry, Schema};

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn tree() -> MerkleTree {
        let entries = vec![
            Entry::allocation(address(1), 100u64),
            Entry::allocation(address(2), 200u64),
            Entry::allocation(address(2), 250u64),
            Entry::allocation(address(3), 300u64),
        ];
        MerkleTree::build(Schema::allocation(), entries).unwrap()
    }

    #[test]
    fn test_find_indices() {
        let tree = tree();
        let indices = find_indices(&tree, &[address(3)]).unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(tree.entry(indices[0]).unwrap().address(), Some(&address(3)));
    }

    #[test]
    fn test_find_indices_collects_every_amount() {
        let tree = tree();
        let indices = find_indices(&tree, &[address(2), address(1), address(2)]).unwrap();
        assert_eq!(indices.len(), 3);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_find_indices_unknown_address() {
        let tree = tree();
        let err = find_indices(&tree, &[address(1), address(9)]).unwrap_err();
        assert!(err.to_string().contains("not found in qualified list"));
    }

    #[test]
    fn test_build_claim_single() {
        let tree = tree();
        let indices = find_indices(&tree, &[address(1)]).unwrap();
        let claim = build_claim(&tree, &indices).unwrap();
        let ClaimJson::Single(report) = claim else {
            panic!("expected a single claim");
        };
        assert_eq!(report.leaf_index, indices[0]);
        assert!(verify(
            &report.schema().unwrap(),
            &report.entry().unwrap(),
            &report.proof().unwrap(),
            &tree.root()
        )
        .unwrap());
    }

    #[test]
    fn test_build_claim_multi() {
        let tree = tree();
        let indices = find_indices(&tree, &[address(2)]).unwrap();
        let claim = build_claim(&tree, &indices).unwrap();
        let ClaimJson::Multi(report) = claim else {
            panic!("expected a multiproof claim");
        };
        assert_eq!(report.leaf_indices, indices);
        assert!(verify_multiproof(
            &report.schema().unwrap(),
            &report.entries().unwrap(),
            &report.multiproof().unwrap(),
            &tree.root()
        )
        .unwrap());
    }

    #[test]
    fn test_claim_json_is_untagged() {
        let tree = tree();
        let claim = build_claim(&tree, &[0]).unwrap();
        let value = serde_json::to_value(&claim).unwrap();
        assert!(value.get("Single").is_none());
        assert_eq!(value["leaf_index"], 0);
    }
}

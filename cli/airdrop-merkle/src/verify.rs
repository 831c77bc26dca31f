use std::fs;
use std::path::PathBuf;

use airdrop_merkle::report::{ClaimReport, MultiproofReport, TreeReport};
use airdrop_merkle::source::{parse_address, parse_amount, DEFAULT_DECIMALS};
use airdrop_merkle::{
    hex_encode, parse_digest, verify, verify_multiproof, Address, Digest, Entry,
};
use anyhow::{Context, Result};
use clap::Args;
use num_bigint::BigUint;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Args, Debug)]
#[command(about = "Verify a claim against a Merkle root", long_about = None)]
pub struct Cli {
    /// Claim JSON written by `claim`, or the proof dump written by `build-tree --output`
    #[arg(short, long)]
    claim: PathBuf,

    /// Published Merkle root (hex). Defaults to the root recorded in the claim.
    #[arg(short, long)]
    root: Option<String>,

    /// Require the claim to cover this address; selects its entries from a proof dump
    #[arg(short, long)]
    address: Option<String>,

    /// Require the address to be allocated this amount, in token units
    #[arg(long, requires = "address")]
    amount: Option<String>,

    /// Token decimals used to read `--amount`
    #[arg(short, long, default_value_t = DEFAULT_DECIMALS)]
    decimals: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClaimFile {
    Single(ClaimReport),
    Multi(MultiproofReport),
    Tree(TreeReport),
}

/// Allocation a claim must cover. Unset fields match anything.
#[derive(Debug, Default)]
struct Expected {
    address: Option<Address>,
    amount: Option<BigUint>,
}

impl Expected {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let address = cli
            .address
            .as_deref()
            .map(|s| {
                parse_address(s)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid address '{}'", s))
            })
            .transpose()?;
        let amount = cli
            .amount
            .as_deref()
            .map(|s| {
                parse_amount(s, cli.decimals)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid amount '{}'", s))
            })
            .transpose()?;
        Ok(Self { address, amount })
    }

    fn matches(&self, entry: &Entry) -> bool {
        let address_ok = self
            .address
            .map_or(true, |address| entry.address() == Some(&address));
        let amount_ok = self
            .amount
            .as_ref()
            .map_or(true, |amount| entry.amount() == Some(amount));
        address_ok && amount_ok
    }
}

/// Root the claim was checked against, the entries checked, and the verdict.
#[derive(Debug)]
struct Outcome {
    root: Digest,
    entries: Vec<Entry>,
    valid: bool,
}

pub fn run(cli: &Cli) -> Result<()> {
    let expected = Expected::from_cli(cli)?;

    info!("Reading claim from {:?}...", cli.claim);
    let content = fs::read_to_string(&cli.claim).context("Failed to read claim file")?;
    let claim = parse_claim_file(&content)?;

    let outcome = check_claim(&claim, cli.root.as_deref(), &expected)?;
    for entry in &outcome.entries {
        println!("Entry: {}", entry);
    }

    if !outcome.valid {
        anyhow::bail!("Claim does not match Merkle root {}", hex_encode(outcome.root));
    }
    println!("Claim is valid for Merkle root {}", hex_encode(outcome.root));
    Ok(())
}

fn parse_claim_file(content: &str) -> Result<ClaimFile> {
    serde_json::from_str(content).context("Failed to parse claim JSON")
}

/// Verifies `claim` and checks it covers `expected`.
///
/// A proof dump is narrowed to the entries matching `expected` and each one is
/// verified on its own; with nothing expected, every entry is verified.
fn check_claim(
    claim: &ClaimFile,
    published: Option<&str>,
    expected: &Expected,
) -> Result<Outcome> {
    let outcome = match claim {
        ClaimFile::Single(claim) => {
            let root = resolve_root(published, &claim.merkle_root)?;
            let schema = claim.schema().context("Invalid leaf encoding")?;
            let entry = claim.entry().context("Invalid claim value")?;
            let proof = claim.proof().context("Invalid Merkle proof")?;
            let valid = verify(&schema, &entry, &proof, &root)?;
            Outcome {
                root,
                entries: vec![entry],
                valid,
            }
        }
        ClaimFile::Multi(claim) => {
            let root = resolve_root(published, &claim.merkle_root)?;
            let schema = claim.schema().context("Invalid leaf encoding")?;
            let entries = claim.entries().context("Invalid claim values")?;
            let multiproof = claim.multiproof().context("Invalid Merkle multiproof")?;
            let valid = verify_multiproof(&schema, &entries, &multiproof, &root)?;
            Outcome {
                root,
                entries,
                valid,
            }
        }
        ClaimFile::Tree(report) => {
            let root = resolve_root(published, &report.merkle_root)?;
            let schema = report.schema().context("Invalid leaf encoding")?;
            let mut entries = Vec::new();
            let mut valid = true;
            for item in &report.entries {
                let entry = schema
                    .parse_entry(item.value.as_slice())
                    .with_context(|| format!("Invalid value at leaf {}", item.leaf_index))?;
                if !expected.matches(&entry) {
                    continue;
                }
                let claim = report
                    .claim(item.leaf_index)
                    .with_context(|| format!("No proof for leaf {}", item.leaf_index))?;
                let proof = claim.proof().context("Invalid Merkle proof")?;
                valid &= verify(&schema, &entry, &proof, &root)?;
                entries.push(entry);
            }
            Outcome {
                root,
                entries,
                valid,
            }
        }
    };

    if !outcome.entries.iter().any(|entry| expected.matches(entry)) {
        match &expected.address {
            Some(address) => anyhow::bail!("Address {} is not covered by the claim", address),
            None => anyhow::bail!("Claim file has no entries"),
        }
    }
    Ok(outcome)
}

fn resolve_root(published: Option<&str>, recorded: &str) -> Result<Digest> {
    match published {
        Some(root) => parse_digest(root).context("Invalid Merkle root"),
        None => {
            warn!("No --root given; checking against the root recorded in the claim itself");
            parse_digest(recorded).context("Invalid Merkle root in claim")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_merkle::{MerkleTree, Schema};

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    fn tree() -> MerkleTree {
        let entries = (1..=5u8).map(|i| Entry::allocation(address(i), u64::from(i) * 100));
        MerkleTree::build(Schema::allocation(), entries).unwrap()
    }

    fn single_json(tree: &MerkleTree, index: usize) -> String {
        let report = ClaimReport::new(tree, &tree.prove_index(index).unwrap()).unwrap();
        serde_json::to_string(&report).unwrap()
    }

    fn multi_json(tree: &MerkleTree, indices: &[usize]) -> String {
        let report = MultiproofReport::new(tree, &tree.prove_indices(indices).unwrap()).unwrap();
        serde_json::to_string(&report).unwrap()
    }

    fn tree_json(tree: &MerkleTree) -> String {
        serde_json::to_string(&TreeReport::new(tree).unwrap()).unwrap()
    }

    fn expect(byte: u8, amount: Option<u64>) -> Expected {
        Expected {
            address: Some(address(byte)),
            amount: amount.map(BigUint::from),
        }
    }

    #[test]
    fn test_parse_each_report_shape() {
        let tree = tree();
        assert!(matches!(
            parse_claim_file(&single_json(&tree, 1)).unwrap(),
            ClaimFile::Single(_)
        ));
        assert!(matches!(
            parse_claim_file(&multi_json(&tree, &[0, 3])).unwrap(),
            ClaimFile::Multi(_)
        ));
        assert!(matches!(
            parse_claim_file(&tree_json(&tree)).unwrap(),
            ClaimFile::Tree(_)
        ));
        assert!(parse_claim_file("{\"merkle_root\": \"0x00\"}").is_err());
    }

    #[test]
    fn test_check_single_claim() {
        let tree = tree();
        let root = hex_encode(tree.root());
        let claim = parse_claim_file(&single_json(&tree, 2)).unwrap();

        let outcome = check_claim(&claim, Some(&root), &Expected::default()).unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.root, tree.root());
        assert_eq!(outcome.entries, vec![tree.entry(2).unwrap().clone()]);

        let other_root = hex_encode([0x11u8; 32]);
        let outcome = check_claim(&claim, Some(&other_root), &Expected::default()).unwrap();
        assert!(!outcome.valid);
    }

    #[test]
    fn test_check_multiproof_claim() {
        let tree = tree();
        let claim = parse_claim_file(&multi_json(&tree, &[0, 2, 4])).unwrap();
        let outcome = check_claim(&claim, None, &Expected::default()).unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.entries.len(), 3);
    }

    #[test]
    fn test_check_tree_dump_every_entry() {
        let tree = tree();
        let root = hex_encode(tree.root());
        let claim = parse_claim_file(&tree_json(&tree)).unwrap();
        let outcome = check_claim(&claim, Some(&root), &Expected::default()).unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.entries.len(), 5);
    }

    #[test]
    fn test_check_tree_dump_selects_address() {
        let tree = tree();
        let root = hex_encode(tree.root());
        let claim = parse_claim_file(&tree_json(&tree)).unwrap();

        let outcome = check_claim(&claim, Some(&root), &expect(3, Some(300))).unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.entries, vec![Entry::allocation(address(3), 300u64)]);

        let err = check_claim(&claim, Some(&root), &expect(3, Some(301))).unwrap_err();
        assert!(err.to_string().contains("not covered"));
        assert!(check_claim(&claim, Some(&root), &expect(9, None)).is_err());
    }

    #[test]
    fn test_check_claim_for_other_address() {
        let tree = tree();
        let index = tree.index_of(&Entry::allocation(address(1), 100u64)).unwrap();
        let claim = parse_claim_file(&single_json(&tree, index)).unwrap();
        assert!(check_claim(&claim, None, &expect(1, Some(100))).is_ok());
        assert!(check_claim(&claim, None, &expect(2, None)).is_err());
    }

    #[test]
    fn test_tampered_tree_dump_is_invalid() {
        let tree = tree();
        let mut report = TreeReport::new(&tree).unwrap();
        report.entries[1].merkle_proof[0] = hex_encode([0x22u8; 32]);
        let claim = parse_claim_file(&serde_json::to_string(&report).unwrap()).unwrap();
        let outcome = check_claim(&claim, None, &Expected::default()).unwrap();
        assert!(!outcome.valid);
    }

    #[test]
    fn test_resolve_root() {
        let recorded = hex_encode([0xaau8; 32]);
        let published = hex_encode([0xbbu8; 32]);
        assert_eq!(
            resolve_root(Some(&published), &recorded).unwrap(),
            [0xbbu8; 32]
        );
        assert_eq!(resolve_root(None, &recorded).unwrap(), [0xaau8; 32]);
        assert!(resolve_root(Some("0x1234"), &recorded).is_err());
        assert!(resolve_root(None, "not a root").is_err());
    }

    #[test]
    fn test_expected_from_cli() {
        let cli = Cli {
            claim: PathBuf::from("claim.json"),
            root: None,
            address: Some("0x328809Bc894f92807417D2dAD6b7C998c1aFdac6".to_string()),
            amount: Some("1.5".to_string()),
            decimals: 2,
        };
        let expected = Expected::from_cli(&cli).unwrap();
        assert_eq!(expected.amount, Some(BigUint::from(150u32)));
        assert_eq!(
            expected.address.unwrap().to_checksum(),
            "0x328809Bc894f92807417D2dAD6b7C998c1aFdac6"
        );

        let cli = Cli {
            address: Some("0x0000000000000000000000000000000000000000".to_string()),
            amount: None,
            ..cli
        };
        assert!(Expected::from_cli(&cli).is_err());
    }
}

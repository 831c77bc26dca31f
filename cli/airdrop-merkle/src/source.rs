//! Whitelist readers.
//!
//! Turns raw whitelist files into typed allocation entries: addresses are
//! normalized and amounts are converted from decimal token units to integer
//! base units. Nothing in the tree core depends on this module.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::encoding::{Address, Entry};
use crate::error::MerkleError;

/// Decimals of a standard ERC-20 token.
pub const DEFAULT_DECIMALS: u32 = 18;

/// Longest accepted amount in base-unit digits; uint256 needs at most 78.
const MAX_AMOUNT_DIGITS: i64 = 96;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON whitelist: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record at line {line}: {reason}")]
    Record { line: usize, reason: String },

    #[error("Duplicate record at lines {first} and {second}")]
    DuplicateRecord { first: usize, second: usize },

    #[error("Whitelist is empty")]
    Empty,
}

/// Layout of a whitelist file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// Pick by file extension: `.json` is JSON, anything else is text.
    #[default]
    Auto,
    /// One `address amount` pair per line.
    Text,
    /// An array of `{ "address": ..., "amount": ... }` objects.
    Json,
}

/// Whitelist entry with the line (or JSON array position) it came from, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub entry: Entry,
}

#[derive(Debug, Deserialize)]
struct JsonRecord {
    address: String,
    amount: serde_json::Value,
}

/// Reads and validates a whitelist file.
pub fn read_whitelist(
    path: &Path,
    format: InputFormat,
    decimals: u32,
) -> Result<Vec<Record>, SourceError> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let format = match format {
        InputFormat::Auto => {
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json {
                InputFormat::Json
            } else {
                InputFormat::Text
            }
        }
        other => other,
    };
    debug!(?path, ?format, decimals, "reading whitelist");

    match format {
        InputFormat::Json => parse_json(&content, decimals),
        _ => parse_text(&content, decimals),
    }
}

/// Parses `address amount` lines. Blank lines are skipped.
pub fn parse_text(content: &str, decimals: u32) -> Result<Vec<Record>, SourceError> {
    let mut records = Vec::new();
    for (line_num, text) in content.lines().enumerate() {
        let line = line_num + 1;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (address, amount) = match (fields.next(), fields.next(), fields.next()) {
            (Some(address), Some(amount), None) => (address, amount),
            _ => {
                return Err(SourceError::Record {
                    line,
                    reason: format!("expected 'address amount', got '{}'", trimmed),
                })
            }
        };
        records.push(parse_record(line, address, amount, decimals)?);
    }
    finish(records)
}

/// Parses a JSON array of `{ "address": ..., "amount": ... }` objects.
///
/// Amounts may be strings or numbers; both are read as decimal token units.
pub fn parse_json(content: &str, decimals: u32) -> Result<Vec<Record>, SourceError> {
    let raw: Vec<JsonRecord> = serde_json::from_str(content)?;
    let mut records = Vec::with_capacity(raw.len());
    for (i, record) in raw.into_iter().enumerate() {
        let line = i + 1;
        let amount = match &record.amount {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(SourceError::Record {
                    line,
                    reason: format!("amount must be a string or number, got {}", other),
                })
            }
        };
        records.push(parse_record(line, &record.address, &amount, decimals)?);
    }
    finish(records)
}

fn parse_record(
    line: usize,
    address: &str,
    amount: &str,
    decimals: u32,
) -> Result<Record, SourceError> {
    let address = parse_address(address).map_err(|reason| SourceError::Record { line, reason })?;
    let amount =
        parse_amount(amount, decimals).map_err(|reason| SourceError::Record { line, reason })?;
    Ok(Record {
        line,
        entry: Entry::allocation(address, amount),
    })
}

fn finish(records: Vec<Record>) -> Result<Vec<Record>, SourceError> {
    if records.is_empty() {
        return Err(SourceError::Empty);
    }

    let mut seen: HashMap<&Entry, usize> = HashMap::with_capacity(records.len());
    let mut by_address: HashMap<&Address, usize> = HashMap::new();
    for record in &records {
        if let Some(&first) = seen.get(&record.entry) {
            return Err(SourceError::DuplicateRecord {
                first,
                second: record.line,
            });
        }
        seen.insert(&record.entry, record.line);

        if let Some(address) = record.entry.address() {
            if let Some(&first) = by_address.get(address) {
                warn!(
                    %address,
                    first,
                    second = record.line,
                    "address listed more than once with different amounts"
                );
            } else {
                by_address.insert(address, record.line);
            }
        }
    }
    debug!(records = records.len(), "parsed whitelist");
    Ok(records)
}

/// Parses a whitelisted address. The zero address is never a valid recipient.
pub fn parse_address(s: &str) -> Result<Address, String> {
    let address: Address = s.parse().map_err(|e: MerkleError| e.to_string())?;
    if address == Address::ZERO {
        return Err("Zero address not allowed".to_string());
    }
    Ok(address)
}

/// Converts a decimal token amount to base units with `decimals` decimals.
///
/// Accepts thousands separators (`1,000.5`) and exponents (`1.5e3`). The
/// conversion is exact: amounts finer than one base unit are rejected
/// rather than rounded.
pub fn parse_amount(s: &str, decimals: u32) -> Result<BigUint, String> {
    let cleaned: String = s.trim().chars().filter(|&c| c != ',' && c != '_').collect();
    if cleaned.starts_with('-') {
        return Err(format!("Negative amount: {}", s.trim()));
    }
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let (mantissa, exponent) = match cleaned.find(|c: char| c == 'e' || c == 'E') {
        Some(pos) => {
            let exponent: i64 = cleaned[pos + 1..]
                .parse()
                .map_err(|_| format!("Invalid exponent in amount: {}", s.trim()))?;
            (&cleaned[..pos], exponent)
        }
        None => (cleaned, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", int_part, frac_part);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid amount: {}", s.trim()));
    }

    let scale = i64::from(decimals)
        .saturating_add(exponent)
        .saturating_sub(frac_part.len() as i64);
    if (digits.len() as i64).saturating_add(scale) > MAX_AMOUNT_DIGITS {
        return Err(format!("Amount too large: {}", s.trim()));
    }
    let digits = if scale >= 0 {
        format!("{}{}", digits, "0".repeat(scale as usize))
    } else {
        let cut = scale.unsigned_abs() as usize;
        let (kept, dropped) = digits.split_at(digits.len().saturating_sub(cut));
        if dropped.bytes().any(|b| b != b'0') {
            return Err(format!(
                "Amount {} has more than {} decimals",
                s.trim(),
                decimals
            ));
        }
        if kept.is_empty() {
            "0".to_string()
        } else {
            kept.to_string()
        }
    };

    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| format!("Invalid amount: {}", s.trim()))
}

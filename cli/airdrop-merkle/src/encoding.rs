//! Canonical encoding of whitelist entries.
//!
//! Every field occupies exactly one 32-byte word, as in Solidity's
//! `abi.encode` for static types:
//!
//! * `address` - 12 zero bytes followed by the 20 address bytes
//! * `uintN`   - big-endian, left-padded with zeros
//! * `bytes32` - the raw bytes
//! * `bool`    - 31 zero bytes followed by `0x00` or `0x01`
//!
//! Fixed-width words leave no room for field-boundary ambiguity.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Serialize, Serializer};

use crate::error::MerkleError;
use crate::hash::{Keccak256, MerkleHasher};

/// Width of one encoded field.
pub const WORD_SIZE: usize = 32;

/// A 20-byte account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Converts the address to a 32-byte word.
    ///
    /// Pads the address with zeros on the left (12 bytes of zeros + 20-byte address).
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..32].copy_from_slice(&self.0);
        word
    }

    /// Renders the address with the EIP-55 mixed-case checksum.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::hash(&[lower.as_bytes()]);
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = MerkleError;

    /// Parses an address from a hex string, with or without "0x" prefix.
    ///
    /// All-lowercase and all-uppercase input is accepted as is; mixed-case
    /// input must carry a valid EIP-55 checksum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if cleaned.len() != 40 {
            return Err(MerkleError::InvalidEntry(format!(
                "Invalid address length: expected 40 hex chars, got {}",
                cleaned.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(cleaned, &mut bytes)
            .map_err(|e| MerkleError::InvalidEntry(format!("Invalid hex encoding: {}", e)))?;
        let address = Address(bytes);

        let has_lower = cleaned.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = cleaned.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *cleaned {
            return Err(MerkleError::InvalidEntry(format!(
                "Bad address checksum: {}",
                trimmed
            )));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

/// Declared type of one entry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Address,
    /// Unsigned integer of the given bit width (8..=256, multiple of 8).
    Uint(u16),
    Bytes32,
    Bool,
}

impl FieldType {
    fn check(self) -> Result<Self, MerkleError> {
        match self {
            FieldType::Uint(bits) if bits == 0 || bits > 256 || bits % 8 != 0 => Err(
                MerkleError::InvalidEntry(format!("Unsupported integer width: uint{}", bits)),
            ),
            other => Ok(other),
        }
    }
}

impl FromStr for FieldType {
    type Err = MerkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim() {
            "address" => FieldType::Address,
            "bytes32" => FieldType::Bytes32,
            "bool" => FieldType::Bool,
            "uint" => FieldType::Uint(256),
            other => {
                let bits = other
                    .strip_prefix("uint")
                    .and_then(|w| w.parse::<u16>().ok())
                    .ok_or_else(|| {
                        MerkleError::InvalidEntry(format!("Unknown field type: {}", other))
                    })?;
                FieldType::Uint(bits)
            }
        };
        ty.check()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Address => f.write_str("address"),
            FieldType::Uint(bits) => write!(f, "uint{}", bits),
            FieldType::Bytes32 => f.write_str("bytes32"),
            FieldType::Bool => f.write_str("bool"),
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Address(Address),
    Uint(BigUint),
    Bytes32([u8; 32]),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Address(address) => write!(f, "{}", address),
            Value::Uint(n) => write!(f, "{}", n),
            Value::Bytes32(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Value {
    /// Parses the string form of a value of type `ty`, as produced by `Display`.
    ///
    /// Integers are plain base-10 base units.
    pub fn parse(ty: FieldType, s: &str) -> Result<Self, MerkleError> {
        let s = s.trim();
        match ty {
            FieldType::Address => Ok(Value::Address(s.parse()?)),
            FieldType::Uint(_) => BigUint::parse_bytes(s.as_bytes(), 10)
                .map(Value::Uint)
                .ok_or_else(|| MerkleError::InvalidEntry(format!("Invalid integer: {}", s))),
            FieldType::Bytes32 => Ok(Value::Bytes32(crate::hash::parse_digest(s)?)),
            FieldType::Bool => match s {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(MerkleError::InvalidEntry(format!("Invalid bool: {}", other))),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One whitelist record: a fixed-arity tuple of typed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Entry(Vec<Value>);

impl Entry {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The `(address, amount)` entry of an airdrop allocation.
    pub fn allocation(address: Address, amount: impl Into<BigUint>) -> Self {
        Self(vec![Value::Address(address), Value::Uint(amount.into())])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// First address field, if any.
    pub fn address(&self) -> Option<&Address> {
        self.0.iter().find_map(|v| match v {
            Value::Address(a) => Some(a),
            _ => None,
        })
    }

    /// First integer field, if any.
    pub fn amount(&self) -> Option<&BigUint> {
        self.0.iter().find_map(|v| match v {
            Value::Uint(n) => Some(n),
            _ => None,
        })
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

/// Ordered field types every entry of a tree must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema(Vec<FieldType>);

impl Schema {
    pub fn new(fields: Vec<FieldType>) -> Result<Self, MerkleError> {
        if fields.is_empty() {
            return Err(MerkleError::InvalidEntry("Schema has no fields".to_string()));
        }
        let fields = fields
            .into_iter()
            .map(FieldType::check)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(fields))
    }

    /// Parses a schema from type names such as `["address", "uint256"]`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, MerkleError> {
        let fields = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<FieldType>, _>>()?;
        Self::new(fields)
    }

    /// `[address, uint256]`, the layout of an airdrop allocation.
    pub fn allocation() -> Self {
        Self(vec![FieldType::Address, FieldType::Uint(256)])
    }

    /// Same as [`Schema::allocation`] with a narrower amount field.
    pub fn allocation_with_bits(bits: u16) -> Result<Self, MerkleError> {
        Self::new(vec![FieldType::Address, FieldType::Uint(bits)])
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.0
    }

    /// Type names, e.g. `["address", "uint256"]`.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|ty| ty.to_string()).collect()
    }

    /// Parses one string per field into an entry of this schema.
    pub fn parse_entry<S: AsRef<str>>(&self, values: &[S]) -> Result<Entry, MerkleError> {
        if values.len() != self.0.len() {
            return Err(MerkleError::InvalidEntry(format!(
                "Expected {} fields, got {}",
                self.0.len(),
                values.len()
            )));
        }
        let values = self
            .0
            .iter()
            .zip(values)
            .map(|(ty, value)| Value::parse(*ty, value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Entry(values))
    }

    /// Serializes `entry` into its canonical byte string.
    pub fn encode(&self, entry: &Entry) -> Result<Vec<u8>, MerkleError> {
        if entry.values().len() != self.0.len() {
            return Err(MerkleError::InvalidEntry(format!(
                "Expected {} fields, got {}",
                self.0.len(),
                entry.values().len()
            )));
        }

        let mut out = Vec::with_capacity(self.0.len() * WORD_SIZE);
        for (position, (ty, value)) in self.0.iter().zip(entry.values()).enumerate() {
            let word = encode_field(*ty, value).map_err(|reason| {
                MerkleError::InvalidEntry(format!("Field {} ({}): {}", position, ty, reason))
            })?;
            out.extend_from_slice(&word);
        }
        Ok(out)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::allocation()
    }
}

fn encode_field(ty: FieldType, value: &Value) -> Result<[u8; WORD_SIZE], String> {
    match (ty, value) {
        (FieldType::Address, Value::Address(address)) => Ok(address.to_word()),
        (FieldType::Uint(bits), Value::Uint(n)) => {
            if n.bits() > u64::from(bits) {
                return Err(format!("{} does not fit in {} bits", n, bits));
            }
            let mut word = [0u8; WORD_SIZE];
            if !n.is_zero() {
                let bytes = n.to_bytes_be();
                word[WORD_SIZE - bytes.len()..].copy_from_slice(&bytes);
            }
            Ok(word)
        }
        (FieldType::Bytes32, Value::Bytes32(bytes)) => Ok(*bytes),
        (FieldType::Bool, Value::Bool(b)) => {
            let mut word = [0u8; WORD_SIZE];
            word[WORD_SIZE - 1] = u8::from(*b);
            Ok(word)
        }
        (ty, value) => Err(format!("expected {}, got {:?}", ty, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn test_parse_address_with_prefix() {
        let addr = "0x1234567890abcdef1234567890abcdef12345678";
        let result: Address = addr.parse().unwrap();
        assert_eq!(result.0[0], 0x12);
        assert_eq!(result.0[19], 0x78);
    }

    #[test]
    fn test_parse_address_without_prefix() {
        let addr = "1234567890abcdef1234567890abcdef12345678";
        assert!(addr.parse::<Address>().is_ok());
    }

    #[test]
    fn test_parse_address_invalid_length() {
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        assert!("0xghijklmnopqrstuvwxyz1234567890abcdef1234"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_checksum_vectors() {
        for vector in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address: Address = vector.parse().unwrap();
            assert_eq!(address.to_checksum(), vector);
        }
    }

    #[test]
    fn test_case_normalization() {
        let lower: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        let upper: Address = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED".parse().unwrap();
        let mixed: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let result = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse::<Address>();
        assert!(matches!(result, Err(MerkleError::InvalidEntry(_))));
    }

    #[test]
    fn test_address_to_word() {
        let word = address(1).to_word();
        assert_eq!(word[0..12], [0u8; 12]);
        assert_eq!(word[12..32], [1u8; 20]);
    }

    #[test]
    fn test_encode_allocation() {
        let entry = Entry::allocation(address(0xaa), 1000u64);
        let encoded = Schema::allocation().encode(&entry).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[12..32], [0xaa; 20]);
        assert_eq!(encoded[32..62], [0u8; 30]);
        assert_eq!(encoded[62..64], [0x03, 0xe8]);
    }

    #[test]
    fn test_encode_zero_amount() {
        let entry = Entry::allocation(address(0xaa), 0u64);
        let encoded = Schema::allocation().encode(&entry).unwrap();
        assert_eq!(encoded[32..64], [0u8; 32]);
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let schema = Schema::allocation_with_bits(8).unwrap();
        assert!(schema.encode(&Entry::allocation(address(1), 255u64)).is_ok());
        let result = schema.encode(&Entry::allocation(address(1), 256u64));
        assert!(matches!(result, Err(MerkleError::InvalidEntry(_))));

        let max = (BigUint::from(1u8) << 256usize) - 1u8;
        assert!(Schema::allocation()
            .encode(&Entry::allocation(address(1), max.clone()))
            .is_ok());
        assert!(Schema::allocation()
            .encode(&Entry::allocation(address(1), max + 1u8))
            .is_err());
    }

    #[test]
    fn test_encode_rejects_wrong_arity_and_type() {
        let schema = Schema::allocation();
        let short = Entry::new(vec![Value::Address(address(1))]);
        assert!(matches!(schema.encode(&short), Err(MerkleError::InvalidEntry(_))));

        let swapped = Entry::new(vec![Value::Uint(1u8.into()), Value::Address(address(1))]);
        assert!(matches!(schema.encode(&swapped), Err(MerkleError::InvalidEntry(_))));
    }

    #[test]
    fn test_schema_parse() {
        let schema = Schema::parse(&["address", "uint256"]).unwrap();
        assert_eq!(schema, Schema::allocation());
        assert_eq!(schema.names(), vec!["address", "uint256"]);

        let wide = Schema::parse(&["bytes32", "bool", "uint64"]).unwrap();
        assert_eq!(
            wide.fields(),
            &[FieldType::Bytes32, FieldType::Bool, FieldType::Uint(64)]
        );

        assert!(Schema::parse(&["uint7"]).is_err());
        assert!(Schema::parse(&["uint512"]).is_err());
        assert!(Schema::parse(&["string"]).is_err());
        assert!(Schema::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn test_encode_bool_and_bytes32() {
        let schema = Schema::parse(&["bytes32", "bool"]).unwrap();
        let entry = Entry::new(vec![Value::Bytes32([9u8; 32]), Value::Bool(true)]);
        let encoded = schema.encode(&entry).unwrap();
        assert_eq!(encoded[0..32], [9u8; 32]);
        assert_eq!(encoded[63], 1);
        assert_eq!(encoded[32..63], [0u8; 31]);
    }

    #[test]
    fn test_parse_entry_from_display_strings() {
        let schema = Schema::parse(&["address", "uint256", "bytes32", "bool"]).unwrap();
        let entry = Entry::new(vec![
            Value::Address(address(0xab)),
            Value::Uint(BigUint::from(10u64).pow(21)),
            Value::Bytes32([5u8; 32]),
            Value::Bool(false),
        ]);
        let strings: Vec<String> = entry.values().iter().map(|v| v.to_string()).collect();
        assert_eq!(schema.parse_entry(&strings).unwrap(), entry);

        assert!(schema.parse_entry(&strings[..2]).is_err());
        assert!(Schema::allocation()
            .parse_entry(&["0x0000000000000000000000000000000000000001", "1.5"])
            .is_err());
    }

    #[test]
    fn test_entry_serializes_as_strings() {
        let entry = Entry::allocation(address(0), 7u64);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            "[\"0x0000000000000000000000000000000000000000\",\"7\"]"
        );
    }

    #[test]
    fn test_entry_accessors() {
        let entry = Entry::allocation(address(2), 5u64);
        assert_eq!(entry.address(), Some(&address(2)));
        assert_eq!(entry.amount(), Some(&BigUint::from(5u64)));
        assert_eq!(
            entry.to_string(),
            format!("[{}, 5]", address(2).to_checksum())
        );
    }
}

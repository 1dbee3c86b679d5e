mod account;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use account::Wei;

/// Numeric identifier of an EVM network.
pub type ChainId = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseHexError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("expected {expected} hex characters, found {found}")]
    Length { expected: usize, found: usize },
    #[error("invalid hex: {0}")]
    Hex(String),
}

fn parse_fixed_hex<const N: usize>(value: &str) -> Result<[u8; N], ParseHexError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    if digits.len() != N * 2 {
        return Err(ParseHexError::Length {
            expected: N * 2,
            found: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|err| ParseHexError::Hex(err.to_string()))?;
    Ok(out)
}

/// 20-byte account or contract address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<20>(s.trim()).map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction hash returned by `eth_sendTransaction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s.trim()).map(Self)
    }
}

/// Renders a chain id the way wallets expect it in `wallet_*` requests.
pub fn chain_id_hex(chain_id: ChainId) -> String {
    format!("0x{chain_id:x}")
}

/// Parses a `0x`-prefixed quantity such as the result of `eth_chainId`.
pub fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_and_displays_lowercase() {
        let address: Address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            .parse()
            .expect("address");
        assert_eq!(
            address.to_string(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn address_rejects_bad_input() {
        assert_eq!(
            "5fbdb2315678afecb367f032d93f642f64180aa3".parse::<Address>(),
            Err(ParseHexError::MissingPrefix)
        );
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(ParseHexError::Length { expected: 40, found: 4 })
        ));
        assert!("0xzz00000000000000000000000000000000000000"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn quantities_roundtrip_through_hex() {
        assert_eq!(chain_id_hex(1337), "0x539");
        assert_eq!(chain_id_hex(11_155_111), "0xaa36a7");
        assert_eq!(parse_quantity("0x539"), Some(1337));
        assert_eq!(parse_quantity("0x"), None);
        assert_eq!(parse_quantity("539"), None);
    }
}

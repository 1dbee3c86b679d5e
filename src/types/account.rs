use std::fmt;
use std::str::FromStr;

use malachite::base::num::conversion::traits::{FromStringBase, ToStringBase};
use malachite::Natural;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Amount of the native asset in its minimal unit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wei {
    inner: Natural,
}

impl Wei {
    pub fn zero() -> Self {
        Self {
            inner: Natural::from(0u32),
        }
    }

    pub fn from_natural(inner: Natural) -> Self {
        Self { inner }
    }

    pub fn from_u128(value: u128) -> Self {
        Self {
            inner: Natural::from(value),
        }
    }

    pub fn as_natural(&self) -> &Natural {
        &self.inner
    }

    pub fn into_natural(self) -> Natural {
        self.inner
    }

    pub fn is_zero(&self) -> bool {
        self.inner == 0u32
    }

    /// Parses a `0x`-prefixed quantity as returned by `eth_getBalance`.
    pub fn from_quantity(value: &str) -> Option<Self> {
        let digits = value.strip_prefix("0x")?;
        if digits.is_empty() {
            return Some(Self::zero());
        }
        Natural::from_string_base(16, &digits.to_ascii_lowercase()).map(Self::from_natural)
    }

    /// Renders the amount as a `0x`-prefixed quantity for JSON-RPC requests.
    pub fn to_quantity(&self) -> String {
        format!("0x{}", self.inner.to_string_base(16))
    }
}

impl Default for Wei {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl FromStr for Wei {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Natural::from_str(s).map(Wei::from_natural)
    }
}

impl Serialize for Wei {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse()
            .map_err(|_| serde::de::Error::custom("invalid wei amount"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_roundtrip() {
        let wei = Wei::from_u128(1_000_000_000_000_000_000);
        assert_eq!(wei.to_quantity(), "0xde0b6b3a7640000");
        assert_eq!(Wei::from_quantity("0xde0b6b3a7640000"), Some(wei));
        assert_eq!(Wei::from_quantity("0x0"), Some(Wei::zero()));
        assert_eq!(Wei::zero().to_quantity(), "0x0");
        assert_eq!(Wei::from_quantity("12"), None);
    }
}

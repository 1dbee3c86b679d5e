//! Typed contract ABI model.
//!
//! ABI JSON is parsed into tagged entries once, when a contract handle is
//! built. Unknown parameter types, unnamed functions and tuples without
//! components are rejected at load time so call sites never see a malformed
//! entry.

mod codec;

use std::fmt;

use malachite::{Integer, Natural};
use serde::Deserialize;
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::types::Address;

pub use codec::{
    decode_bytes32_string, decode_revert_reason, decode_values, encode_bytes32_string,
    encode_values,
};

/// ABI of the deployed ballot contract.
pub const BALLOT_ABI_JSON: &str = include_str!("ballot.json");
/// ABI of the payment-account contract.
pub const PAYMENT_ABI_JSON: &str = include_str!("payment.json");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid ABI JSON: {0}")]
    Json(String),
    #[error("ABI entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("unsupported ABI type `{0}`")]
    UnsupportedType(String),
    #[error("function `{0}` not found in ABI")]
    UnknownFunction(String),
    #[error("`{function}` expects {expected} arguments, got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("value does not match ABI type `{expected}`")]
    TypeMismatch { expected: String },
    #[error("value out of range for `{0}`")]
    OutOfRange(String),
    #[error("return data too short or malformed")]
    Truncated,
    #[error("string `{0}` does not fit in 31 bytes")]
    StringTooLong(String),
    #[error("bytes32 field is not valid UTF-8")]
    InvalidUtf8,
}

pub type AbiResult<T> = Result<T, AbiError>;

/// Solidity parameter type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiType {
    Uint(usize),
    Int(usize),
    Bool,
    Address,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
    Tuple(Vec<AbiParam>),
}

impl AbiType {
    fn parse(raw: &str, components: Option<&[RawParam]>) -> AbiResult<Self> {
        let unsupported = || AbiError::UnsupportedType(raw.to_string());
        if let Some(inner) = raw.strip_suffix(']') {
            let open = inner.rfind('[').ok_or_else(unsupported)?;
            let element = Self::parse(&inner[..open], components)?;
            let size = &inner[open + 1..];
            if size.is_empty() {
                return Ok(Self::Array(Box::new(element)));
            }
            let size: usize = size.parse().map_err(|_| unsupported())?;
            if size == 0 || element.head_size().checked_mul(size).is_none() {
                return Err(unsupported());
            }
            return Ok(Self::FixedArray(Box::new(element), size));
        }

        match raw {
            "bool" => Ok(Self::Bool),
            "address" => Ok(Self::Address),
            "bytes" => Ok(Self::Bytes),
            "string" => Ok(Self::String),
            "uint" => Ok(Self::Uint(256)),
            "int" => Ok(Self::Int(256)),
            "tuple" => {
                let components = components.ok_or_else(|| {
                    AbiError::UnsupportedType("tuple without components".to_string())
                })?;
                let params = components
                    .iter()
                    .map(AbiParam::from_raw)
                    .collect::<AbiResult<Vec<_>>>()?;
                Ok(Self::Tuple(params))
            }
            other => {
                if let Some(bits) = other.strip_prefix("uint") {
                    parse_bits(bits).map(Self::Uint).ok_or_else(unsupported)
                } else if let Some(bits) = other.strip_prefix("int") {
                    parse_bits(bits).map(Self::Int).ok_or_else(unsupported)
                } else if let Some(size) = other.strip_prefix("bytes") {
                    match size.parse::<usize>() {
                        Ok(size) if (1..=32).contains(&size) => Ok(Self::FixedBytes(size)),
                        _ => Err(unsupported()),
                    }
                } else {
                    Err(unsupported())
                }
            }
        }
    }

    /// Whether the encoding of this type lives in the tail section.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(element, _) => element.is_dynamic(),
            Self::Tuple(params) => params.iter().any(|param| param.kind.is_dynamic()),
            _ => false,
        }
    }

    /// Size in bytes of the head slot occupied by this type.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            Self::FixedArray(element, size) => element.head_size().saturating_mul(*size),
            Self::Tuple(params) => params
                .iter()
                .map(|param| param.kind.head_size())
                .fold(0, usize::saturating_add),
            _ => 32,
        }
    }
}

fn parse_bits(bits: &str) -> Option<usize> {
    let bits: usize = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Bool => write!(f, "bool"),
            Self::Address => write!(f, "address"),
            Self::FixedBytes(size) => write!(f, "bytes{size}"),
            Self::Bytes => write!(f, "bytes"),
            Self::String => write!(f, "string"),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::FixedArray(element, size) => write!(f, "{element}[{size}]"),
            Self::Tuple(params) => {
                write!(f, "(")?;
                for (position, param) in params.iter().enumerate() {
                    if position > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", param.kind)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiParam {
    pub name: String,
    pub kind: AbiType,
    pub indexed: bool,
}

impl AbiParam {
    fn from_raw(raw: &RawParam) -> AbiResult<Self> {
        Ok(Self {
            name: raw.name.clone(),
            kind: AbiType::parse(&raw.kind, raw.components.as_deref())?,
            indexed: raw.indexed.unwrap_or(false),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.unwrap_or("nonpayable") {
            "pure" => Some(Self::Pure),
            "view" => Some(Self::View),
            "nonpayable" => Some(Self::NonPayable),
            "payable" => Some(Self::Payable),
            _ => None,
        }
    }
}

/// Callable contract function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    pub state_mutability: StateMutability,
}

impl AbiFunction {
    /// Canonical signature such as `vote(uint256)`.
    pub fn signature(&self) -> String {
        let inputs = AbiType::Tuple(self.inputs.clone());
        format!("{}{}", self.name, inputs)
    }

    pub fn selector(&self) -> [u8; 4] {
        let digest = Keccak256::digest(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&digest[..4]);
        selector
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self.state_mutability,
            StateMutability::View | StateMutability::Pure
        )
    }

    pub fn is_payable(&self) -> bool {
        self.state_mutability == StateMutability::Payable
    }

    /// Selector followed by the encoded arguments.
    pub fn encode_call(&self, args: &[AbiValue]) -> AbiResult<Vec<u8>> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArgumentCount {
                function: self.name.clone(),
                expected: self.inputs.len(),
                found: args.len(),
            });
        }
        let types: Vec<AbiType> = self.inputs.iter().map(|param| param.kind.clone()).collect();
        let mut calldata = self.selector().to_vec();
        calldata.extend(encode_values(&types, args)?);
        Ok(calldata)
    }

    /// Decodes the arguments of a call produced by [`AbiFunction::encode_call`].
    pub fn decode_input(&self, calldata: &[u8]) -> AbiResult<Vec<AbiValue>> {
        if calldata.len() < 4 || calldata[..4] != self.selector() {
            return Err(AbiError::Truncated);
        }
        let types: Vec<AbiType> = self.inputs.iter().map(|param| param.kind.clone()).collect();
        decode_values(&types, &calldata[4..])
    }

    pub fn encode_output(&self, values: &[AbiValue]) -> AbiResult<Vec<u8>> {
        let types: Vec<AbiType> = self.outputs.iter().map(|param| param.kind.clone()).collect();
        encode_values(&types, values)
    }

    pub fn decode_output(&self, data: &[u8]) -> AbiResult<Vec<AbiValue>> {
        let types: Vec<AbiType> = self.outputs.iter().map(|param| param.kind.clone()).collect();
        decode_values(&types, data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiEvent {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub anonymous: bool,
}

/// One validated entry of a contract ABI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiEntry {
    Function(AbiFunction),
    Constructor {
        inputs: Vec<AbiParam>,
        state_mutability: StateMutability,
    },
    Event(AbiEvent),
    Error {
        name: String,
        inputs: Vec<AbiParam>,
    },
    Fallback {
        state_mutability: StateMutability,
    },
    Receive,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    state_mutability: Option<String>,
    #[serde(default)]
    anonymous: bool,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    components: Option<Vec<RawParam>>,
    indexed: Option<bool>,
}

/// Parsed and validated contract ABI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractAbi {
    entries: Vec<AbiEntry>,
}

impl ContractAbi {
    pub fn from_json(json: &str) -> AbiResult<Self> {
        let raw: Vec<RawEntry> =
            serde_json::from_str(json).map_err(|err| AbiError::Json(err.to_string()))?;
        let entries = raw
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Self::validate_entry(entry).map_err(|err| AbiError::InvalidEntry {
                    index,
                    reason: err.to_string(),
                })
            })
            .collect::<AbiResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn ballot() -> AbiResult<Self> {
        Self::from_json(BALLOT_ABI_JSON)
    }

    pub fn payment() -> AbiResult<Self> {
        Self::from_json(PAYMENT_ABI_JSON)
    }

    fn validate_entry(entry: &RawEntry) -> AbiResult<AbiEntry> {
        let params = |raw: &[RawParam]| {
            raw.iter()
                .map(AbiParam::from_raw)
                .collect::<AbiResult<Vec<_>>>()
        };
        let mutability = || {
            StateMutability::parse(entry.state_mutability.as_deref()).ok_or_else(|| {
                AbiError::Json(format!(
                    "unknown stateMutability `{}`",
                    entry.state_mutability.as_deref().unwrap_or_default()
                ))
            })
        };
        let named = || match entry.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(AbiError::Json("entry is missing a name".to_string())),
        };

        match entry.kind.as_deref().unwrap_or("function") {
            "function" => Ok(AbiEntry::Function(AbiFunction {
                name: named()?,
                inputs: params(&entry.inputs)?,
                outputs: params(&entry.outputs)?,
                state_mutability: mutability()?,
            })),
            "constructor" => Ok(AbiEntry::Constructor {
                inputs: params(&entry.inputs)?,
                state_mutability: mutability()?,
            }),
            "event" => Ok(AbiEntry::Event(AbiEvent {
                name: named()?,
                inputs: params(&entry.inputs)?,
                anonymous: entry.anonymous,
            })),
            "error" => Ok(AbiEntry::Error {
                name: named()?,
                inputs: params(&entry.inputs)?,
            }),
            "fallback" => Ok(AbiEntry::Fallback {
                state_mutability: mutability()?,
            }),
            "receive" => Ok(AbiEntry::Receive),
            other => Err(AbiError::Json(format!("unknown entry type `{other}`"))),
        }
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = &AbiFunction> {
        self.entries.iter().filter_map(|entry| match entry {
            AbiEntry::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> AbiResult<&AbiFunction> {
        self.functions()
            .find(|function| function.name == name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Looks a function up by the selector at the start of `calldata`.
    pub fn function_by_selector(&self, calldata: &[u8]) -> Option<&AbiFunction> {
        let selector = calldata.get(..4)?;
        self.functions()
            .find(|function| function.selector().as_slice() == selector)
    }
}

/// Decoded or to-be-encoded ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Uint(Natural),
    Int(Integer),
    Bool(bool),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        Self::Uint(Natural::from(value))
    }

    pub fn as_uint(&self) -> Option<&Natural> {
        match self {
            Self::Uint(value) => Some(value),
            _ => None,
        }
    }

    /// Unsigned value narrowed to `u64`, if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(|value| u64::try_from(value).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_fixed_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::FixedBytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AbiValue]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[AbiValue]> {
        match self {
            Self::Tuple(values) => Some(values),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_fixed_arrays_are_rejected() {
        assert!(matches!(
            AbiType::parse("uint256[18446744073709551615]", None),
            Err(AbiError::UnsupportedType(_))
        ));
        let nested = AbiType::parse("bool[4][3]", None).expect("nested array");
        assert_eq!(nested.head_size(), 12 * 32);
    }

    #[test]
    fn bundled_abis_load() {
        let ballot = ContractAbi::ballot().expect("ballot abi");
        for name in [
            "proposals",
            "getProposals",
            "voters",
            "winnerName",
            "winningProposal",
            "vote",
        ] {
            ballot.function(name).expect(name);
        }
        assert!(ballot.function("vote").expect("vote").inputs.len() == 1);
        assert!(ballot.function("winnerName").expect("winner").is_read_only());
        assert!(matches!(ballot.entries()[0], AbiEntry::Constructor { .. }));

        let payment = ContractAbi::payment().expect("payment abi");
        assert!(payment.function("payETH").expect("payETH").is_payable());
    }

    #[test]
    fn signatures_and_selectors_match_solidity() {
        let ballot = ContractAbi::ballot().expect("ballot abi");
        let vote = ballot.function("vote").expect("vote");
        assert_eq!(vote.signature(), "vote(uint256)");
        assert_eq!(hex::encode(vote.selector()), "0121b93f");
        let voters = ballot.function("voters").expect("voters");
        assert_eq!(voters.signature(), "voters(address)");
        assert_eq!(hex::encode(voters.selector()), "a3ec138d");
        let proposals = ballot.function("getProposals").expect("getProposals");
        assert_eq!(
            proposals.outputs[0].kind.to_string(),
            "(bytes32,uint256)[]"
        );
    }

    #[test]
    fn malformed_entries_are_rejected_at_load() {
        let unknown_type = r#"[{"type":"function","name":"f","inputs":[{"name":"x","type":"uint7"}],"outputs":[]}]"#;
        assert!(matches!(
            ContractAbi::from_json(unknown_type),
            Err(AbiError::InvalidEntry { index: 0, .. })
        ));

        let unnamed = r#"[{"type":"function","inputs":[],"outputs":[]}]"#;
        assert!(ContractAbi::from_json(unnamed).is_err());

        let bare_tuple = r#"[{"type":"function","name":"f","inputs":[{"name":"t","type":"tuple"}]}]"#;
        assert!(ContractAbi::from_json(bare_tuple).is_err());

        let bad_mutability = r#"[{"type":"function","name":"f","stateMutability":"mutable"}]"#;
        assert!(ContractAbi::from_json(bad_mutability).is_err());

        assert!(matches!(
            ContractAbi::from_json("{not json"),
            Err(AbiError::Json(_))
        ));
    }

    #[test]
    fn call_arguments_are_checked() {
        let ballot = ContractAbi::ballot().expect("ballot abi");
        let vote = ballot.function("vote").expect("vote");
        assert!(matches!(
            vote.encode_call(&[]),
            Err(AbiError::ArgumentCount { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            vote.encode_call(&[AbiValue::Bool(true)]),
            Err(AbiError::TypeMismatch { .. })
        ));
        let calldata = vote.encode_call(&[AbiValue::uint(2)]).expect("encode");
        assert_eq!(calldata.len(), 36);
        assert_eq!(ballot.function_by_selector(&calldata), Some(vote));
    }
}

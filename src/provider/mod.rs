//! Wallet provider abstraction.
//!
//! The provider surface mirrors EIP-1193: a single `request(method, params)`
//! entry point plus `accountsChanged`/`chainChanged` notifications, which are
//! delivered through scoped [`EventSubscription`]s. [`HttpProvider`] talks to
//! a node's JSON-RPC endpoint; the mock provider drives tests.

mod events;
mod http;
#[cfg(any(test, feature = "mock-provider"))]
pub mod mock;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::abi::decode_revert_reason;
use crate::types::{chain_id_hex, parse_quantity, Address, ChainId, TxHash, Wei};

pub use events::{EventEmitter, EventSubscription, ProviderEvent};
pub use http::HttpProvider;
#[cfg(any(test, feature = "mock-provider"))]
pub use mock::{MockContract, MockProvider};

/// The user dismissed or rejected the wallet prompt.
pub const USER_REJECTED_REQUEST: i64 = 4001;
/// The wallet does not know the requested chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Code used by nodes for `execution reverted` failures.
pub const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider error [{code}]: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("unexpected `{method}` response: {reason}")]
    InvalidResponse { method: String, reason: String },
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn user_rejected() -> Self {
        Self::rpc(USER_REJECTED_REQUEST, "User rejected the request.")
    }

    fn invalid(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_REQUEST)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(UNRECOGNIZED_CHAIN)
    }

    /// Revert reason carried by the error, decoded from the revert data when
    /// present and otherwise taken from an `execution reverted: ...` message.
    pub fn revert_reason(&self) -> Option<String> {
        let Self::Rpc { message, data, .. } = self else {
            return None;
        };
        let raw = match data {
            Some(Value::String(raw)) => Some(raw.as_str()),
            Some(Value::Object(map)) => map.get("data").and_then(Value::as_str),
            _ => None,
        };
        if let Some(reason) = raw
            .and_then(|raw| raw.strip_prefix("0x"))
            .and_then(|digits| hex::decode(digits).ok())
            .and_then(|bytes| decode_revert_reason(&bytes))
        {
            return Some(reason);
        }
        message
            .split_once("reverted: ")
            .map(|(_, reason)| reason.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Write transaction submitted through `eth_sendTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: Option<Wei>,
    pub data: Vec<u8>,
}

impl TransactionRequest {
    pub fn to_json(&self) -> Value {
        let mut tx = json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let (Some(value), Some(map)) = (&self.value, tx.as_object_mut()) {
            map.insert("value".to_string(), Value::String(value.to_quantity()));
        }
        tx
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

impl TransactionReceipt {
    fn from_json(value: &Value) -> ProviderResult<Self> {
        let method = "eth_getTransactionReceipt";
        let transaction_hash = value
            .get("transactionHash")
            .and_then(Value::as_str)
            .and_then(|hash| hash.parse().ok())
            .ok_or_else(|| ProviderError::invalid(method, "missing transactionHash"))?;
        let block_number = value
            .get("blockNumber")
            .and_then(Value::as_str)
            .and_then(parse_quantity);
        let success = match value.get("status").and_then(Value::as_str) {
            Some(status) => parse_quantity(status) == Some(1),
            None => return Err(ProviderError::invalid(method, "missing status")),
        };
        Ok(Self {
            transaction_hash,
            block_number,
            success,
        })
    }
}

fn parse_address_list(method: &str, value: Value) -> ProviderResult<Vec<Address>> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::invalid(method, "expected an array of accounts"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| ProviderError::invalid(method, format!("invalid account {item}")))
        })
        .collect()
}

fn parse_hex_bytes(method: &str, value: &Value) -> ProviderResult<Vec<u8>> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::invalid(method, "expected hex string"))?;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::invalid(method, "missing 0x prefix"))?;
    hex::decode(digits).map_err(|err| ProviderError::invalid(method, err.to_string()))
}

/// Request/notification surface of an injected or remote wallet.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> ProviderResult<Value>;

    /// Emitter backing `accountsChanged`/`chainChanged` notifications.
    fn events(&self) -> &Arc<EventEmitter>;

    async fn request_accounts(&self) -> ProviderResult<Vec<Address>> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        parse_address_list("eth_requestAccounts", value)
    }

    async fn chain_id(&self) -> ProviderResult<ChainId> {
        let value = self.request("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| ProviderError::invalid("eth_chainId", format!("got {value}")))
    }

    async fn balance(&self, address: Address) -> ProviderResult<Wei> {
        let value = self
            .request("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        value
            .as_str()
            .and_then(Wei::from_quantity)
            .ok_or_else(|| ProviderError::invalid("eth_getBalance", format!("got {value}")))
    }

    async fn code(&self, address: Address) -> ProviderResult<Vec<u8>> {
        let value = self
            .request("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        parse_hex_bytes("eth_getCode", &value)
    }

    async fn call(&self, to: Address, data: &[u8]) -> ProviderResult<Vec<u8>> {
        let tx = json!({
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        let value = self.request("eth_call", json!([tx, "latest"])).await?;
        parse_hex_bytes("eth_call", &value)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> ProviderResult<TxHash> {
        let value = self
            .request("eth_sendTransaction", json!([tx.to_json()]))
            .await?;
        value
            .as_str()
            .and_then(|hash| hash.parse().ok())
            .ok_or_else(|| ProviderError::invalid("eth_sendTransaction", format!("got {value}")))
    }

    /// `None` while the transaction is still pending.
    async fn transaction_receipt(&self, hash: TxHash) -> ProviderResult<Option<TransactionReceipt>> {
        let value = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        TransactionReceipt::from_json(&value).map(Some)
    }

    async fn switch_chain(&self, chain_id: ChainId) -> ProviderResult<()> {
        self.request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain_id_hex(chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    async fn add_chain(&self, params: Value) -> ProviderResult<()> {
        self.request("wallet_addEthereumChain", json!([params]))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reason_prefers_encoded_data() {
        let data = "0x08c379a0\
            0000000000000000000000000000000000000000000000000000000000000020\
            000000000000000000000000000000000000000000000000000000000000000e\
            416c726561647920766f7465642e000000000000000000000000000000000000";
        let error = ProviderError::Rpc {
            code: EXECUTION_REVERTED,
            message: "execution reverted".into(),
            data: Some(Value::String(data.into())),
        };
        assert_eq!(error.revert_reason().as_deref(), Some("Already voted."));

        let nested = ProviderError::Rpc {
            code: -32603,
            message: "Internal JSON-RPC error.".into(),
            data: Some(json!({ "data": data })),
        };
        assert_eq!(nested.revert_reason().as_deref(), Some("Already voted."));
    }

    #[test]
    fn corrupt_revert_length_falls_back_to_message() {
        let data = format!(
            "0x08c379a0{:0>64}{:0>64}",
            "20",
            "f".repeat(16)
        );
        let error = ProviderError::Rpc {
            code: EXECUTION_REVERTED,
            message: "execution reverted: Already voted.".into(),
            data: Some(Value::String(data)),
        };
        assert_eq!(error.revert_reason().as_deref(), Some("Already voted."));
    }

    #[test]
    fn revert_reason_falls_back_to_message() {
        let error = ProviderError::rpc(
            -32603,
            "VM Exception while processing transaction: reverted: Has no right to vote",
        );
        assert_eq!(error.revert_reason().as_deref(), Some("Has no right to vote"));
        assert_eq!(ProviderError::user_rejected().revert_reason(), None);
        assert!(ProviderError::user_rejected().is_user_rejection());
        assert!(ProviderError::rpc(4902, "unknown chain").is_unrecognized_chain());
    }

    #[test]
    fn receipts_parse_status() {
        let hash = format!("0x{}", "11".repeat(32));
        let receipt = TransactionReceipt::from_json(&json!({
            "transactionHash": hash,
            "blockNumber": "0x10",
            "status": "0x1",
        }))
        .expect("receipt");
        assert!(receipt.success);
        assert_eq!(receipt.block_number, Some(16));

        let failed = TransactionReceipt::from_json(&json!({
            "transactionHash": hash,
            "status": "0x0",
        }))
        .expect("receipt");
        assert!(!failed.success);
        assert!(TransactionReceipt::from_json(&json!({ "status": "0x1" })).is_err());
    }

    #[test]
    fn transaction_request_serializes_value_only_when_set() {
        let tx = TransactionRequest {
            from: Address::new([1u8; 20]),
            to: Address::new([2u8; 20]),
            value: None,
            data: vec![0x01, 0x21],
        };
        let value = tx.to_json();
        assert_eq!(value["data"], "0x0121");
        assert!(value.get("value").is_none());

        let paid = TransactionRequest {
            value: Some(Wei::from_u128(1_000)),
            ..tx
        };
        assert_eq!(paid.to_json()["value"], "0x3e8");
    }
}

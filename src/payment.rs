//! Payment-account contract client.

use std::time::Duration;

use tracing::{info, warn};

use crate::abi::{AbiValue, ContractAbi};
use crate::contract::{wait_for_confirmation, ContractHandle, DEFAULT_CONFIRMATION_POLL_MS};
use crate::errors::{DappError, DappResult};
use crate::provider::TransactionReceipt;
use crate::session::SessionManager;
use crate::types::Address;
use crate::units::{parse_ether, ETHER_DECIMALS};

pub const DEFAULT_PAYMENT_MEMO: &str = "payment";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Native,
    Erc20 { address: Option<Address> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentToken {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub kind: TokenKind,
}

impl PaymentToken {
    pub fn eth() -> Self {
        Self {
            name: "ETH".to_string(),
            symbol: "ETH".to_string(),
            decimals: ETHER_DECIMALS,
            kind: TokenKind::Native,
        }
    }

    pub fn usdt() -> Self {
        Self {
            name: "USDT".to_string(),
            symbol: "USDT".to_string(),
            decimals: 6,
            kind: TokenKind::Erc20 { address: None },
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::eth(), Self::usdt()]
    }

    /// Case-insensitive lookup among the built-in tokens.
    pub fn by_symbol(symbol: &str) -> Option<Self> {
        Self::builtin()
            .into_iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn is_native(&self) -> bool {
        self.kind == TokenKind::Native
    }

    /// Quick-pick amounts offered for this token.
    pub fn preset_amounts(&self) -> &'static [&'static str] {
        match self.symbol.as_str() {
            "ETH" => &["0.001", "0.01", "0.1"],
            "USDT" => &["10", "100", "1000"],
            _ => &[],
        }
    }
}

pub struct PaymentClient {
    contract: ContractHandle,
    memo: String,
    poll_interval: Duration,
}

impl PaymentClient {
    pub fn new(address: Address) -> DappResult<Self> {
        Ok(Self::with_contract(ContractHandle::new(
            address,
            ContractAbi::payment()?,
        )))
    }

    pub fn with_contract(contract: ContractHandle) -> Self {
        Self {
            contract,
            memo: DEFAULT_PAYMENT_MEMO.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_CONFIRMATION_POLL_MS),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    /// Pays `amount` (a decimal string in whole units) to the contract and
    /// waits for one confirmation.
    ///
    /// Only the native asset is accepted; token payments are rejected before
    /// the provider is contacted.
    pub async fn pay(
        &self,
        session: &SessionManager,
        amount: &str,
        token: &PaymentToken,
    ) -> DappResult<TransactionReceipt> {
        if !token.is_native() {
            return Err(DappError::UnsupportedToken {
                symbol: token.symbol.clone(),
            });
        }
        let account = session.require_account()?;
        let value =
            parse_ether(amount).map_err(|err| DappError::InvalidAmount(err.to_string()))?;
        if value.is_zero() {
            return Err(DappError::InvalidAmount(format!(
                "payment amount must be positive, got `{amount}`"
            )));
        }

        let provider = session.provider()?;
        let result = async {
            let hash = self
                .contract
                .send(
                    provider.as_ref(),
                    account,
                    "payETH",
                    &[AbiValue::String(self.memo.clone())],
                    Some(value),
                )
                .await?;
            wait_for_confirmation(provider.as_ref(), hash, self.poll_interval).await
        }
        .await;
        match &result {
            Ok(receipt) => info!(%account, amount, hash = %receipt.transaction_hash, "payment confirmed"),
            Err(err) => warn!(%account, amount, error = %err, "payment failed"),
        }
        result
    }
}

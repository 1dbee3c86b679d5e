//! Read/write plumbing shared by the ballot and payment clients.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::abi::{AbiError, AbiValue, ContractAbi};
use crate::errors::{DappError, DappResult};
use crate::provider::{Eip1193Provider, ProviderError, TransactionReceipt, TransactionRequest};
use crate::types::{Address, TxHash, Wei};

pub const DEFAULT_CONFIRMATION_POLL_MS: u64 = 1_000;

/// Address plus validated ABI of a deployed contract.
#[derive(Clone, Debug)]
pub struct ContractHandle {
    address: Address,
    abi: ContractAbi,
}

impl ContractHandle {
    pub fn new(address: Address, abi: ContractAbi) -> Self {
        Self { address, abi }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// Fails with [`DappError::ContractNotFound`] when no code is deployed.
    pub async fn ensure_deployed(&self, provider: &dyn Eip1193Provider) -> DappResult<()> {
        let code = provider.code(self.address).await?;
        if code.is_empty() {
            warn!(address = %self.address, "no contract code at address");
            return Err(DappError::ContractNotFound {
                address: self.address,
            });
        }
        Ok(())
    }

    /// Runs a read-only call through `eth_call` and decodes its outputs.
    pub async fn call(
        &self,
        provider: &dyn Eip1193Provider,
        function: &str,
        args: &[AbiValue],
    ) -> DappResult<Vec<AbiValue>> {
        let function = self.abi.function(function)?;
        let calldata = function.encode_call(args)?;
        debug!(contract = %self.address, function = %function.name, "contract read");
        let output = provider.call(self.address, &calldata).await?;
        Ok(function.decode_output(&output)?)
    }

    /// Submits a write call; wallet rejections and reverts surface as
    /// [`DappError::TransactionRejected`] carrying the wallet's reason.
    pub async fn send(
        &self,
        provider: &dyn Eip1193Provider,
        from: Address,
        function: &str,
        args: &[AbiValue],
        value: Option<Wei>,
    ) -> DappResult<TxHash> {
        let function = self.abi.function(function)?;
        if value.is_some() && !function.is_payable() {
            return Err(DappError::InvalidAmount(format!(
                "`{}` does not accept value",
                function.name
            )));
        }
        let tx = TransactionRequest {
            from,
            to: self.address,
            value,
            data: function.encode_call(args)?,
        };
        match provider.send_transaction(&tx).await {
            Ok(hash) => {
                info!(contract = %self.address, function = %function.name, %hash, "transaction submitted");
                Ok(hash)
            }
            Err(err) => Err(rejection(err)),
        }
    }
}

fn rejection(err: ProviderError) -> DappError {
    if let Some(reason) = err.revert_reason() {
        return DappError::TransactionRejected { reason };
    }
    match err {
        ProviderError::Rpc { message, .. } => DappError::TransactionRejected { reason: message },
        other => DappError::Provider(other),
    }
}

/// Polls for the receipt of `hash` until it is mined. There is no upper bound
/// on the wait.
pub async fn wait_for_confirmation(
    provider: &dyn Eip1193Provider,
    hash: TxHash,
    poll_interval: Duration,
) -> DappResult<TransactionReceipt> {
    loop {
        if let Some(receipt) = provider.transaction_receipt(hash).await? {
            if !receipt.success {
                warn!(%hash, "transaction reverted");
                return Err(DappError::TransactionReverted {
                    hash,
                    reason: "execution reverted".to_string(),
                });
            }
            info!(%hash, block = ?receipt.block_number, "transaction confirmed");
            return Ok(receipt);
        }
        debug!(%hash, "transaction pending");
        tokio::time::sleep(poll_interval).await;
    }
}

/// Error for return data that decoded but has an unexpected shape.
pub(crate) fn unexpected_output(expected: &str) -> DappError {
    DappError::Abi(AbiError::TypeMismatch {
        expected: expected.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockProvider, EXECUTION_REVERTED};
    use serde_json::json;

    fn handle() -> ContractHandle {
        ContractHandle::new(
            Address::new([0x5f; 20]),
            ContractAbi::payment().expect("payment abi"),
        )
    }

    #[tokio::test]
    async fn missing_code_is_contract_not_found() {
        let provider = MockProvider::new(1337, vec![Address::new([1; 20])]);
        let err = handle().ensure_deployed(&provider).await.expect_err("no code");
        assert!(matches!(err, DappError::ContractNotFound { .. }));
    }

    #[tokio::test]
    async fn send_maps_reverts_to_reason() {
        let from = Address::new([1; 20]);
        let provider = MockProvider::new(1337, vec![from]);
        provider.push_response(
            "eth_sendTransaction",
            Err(ProviderError::Rpc {
                code: EXECUTION_REVERTED,
                message: "execution reverted: Has no right to vote".into(),
                data: None,
            }),
        );
        let err = handle()
            .send(&provider, from, "payETH", &[AbiValue::String("memo".into())], None)
            .await
            .expect_err("revert");
        match err {
            DappError::TransactionRejected { reason } => assert_eq!(reason, "Has no right to vote"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirmation_polls_until_mined() {
        let provider = MockProvider::new(1337, vec![]);
        let hash = TxHash::new([9; 32]);
        provider.push_response("eth_getTransactionReceipt", Ok(json!(null)));
        provider.push_response("eth_getTransactionReceipt", Ok(json!(null)));
        provider.push_response(
            "eth_getTransactionReceipt",
            Ok(json!({ "transactionHash": hash.to_string(), "blockNumber": "0x2", "status": "0x0" })),
        );
        let err = wait_for_confirmation(&provider, hash, Duration::from_millis(1))
            .await
            .expect_err("reverted");
        assert!(matches!(err, DappError::TransactionReverted { .. }));
        assert_eq!(provider.request_count("eth_getTransactionReceipt"), 3);
    }
}

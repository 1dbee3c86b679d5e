use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};

use super::{
    EventEmitter, Eip1193Provider, ProviderError, ProviderEvent, ProviderResult,
    EXECUTION_REVERTED, METHOD_NOT_FOUND, UNRECOGNIZED_CHAIN,
};
use crate::abi::decode_revert_reason;
use crate::types::{chain_id_hex, parse_quantity, Address, ChainId, TxHash, Wei};

/// Contract behaviour plugged into [`MockProvider`]; errors carry revert data.
pub trait MockContract: Send {
    fn call(&self, data: &[u8]) -> Result<Vec<u8>, Vec<u8>>;
    fn transact(&mut self, from: Address, value: &Wei, data: &[u8]) -> Result<(), Vec<u8>>;
}

#[derive(Clone)]
struct StoredReceipt {
    success: bool,
    block_number: u64,
    pending_polls: usize,
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Address>,
    chain_id: ChainId,
    known_chains: HashSet<ChainId>,
    balances: HashMap<Address, Wei>,
    code: HashMap<Address, Vec<u8>>,
    contracts: HashMap<Address, Box<dyn MockContract>>,
    receipts: HashMap<TxHash, StoredReceipt>,
    receipt_delay: usize,
    scripted: HashMap<String, VecDeque<ProviderResult<Value>>>,
    requests: Vec<(String, Value)>,
    tx_count: u64,
}

/// In-memory wallet used by tests and local harnesses.
///
/// Handles the account, chain, code, call and transaction methods itself;
/// responses queued with [`MockProvider::push_response`] take precedence.
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    events: Arc<EventEmitter>,
}

impl MockProvider {
    pub fn new(chain_id: ChainId, accounts: Vec<Address>) -> Self {
        let state = MockState {
            accounts,
            chain_id,
            known_chains: HashSet::from([chain_id]),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            events: EventEmitter::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_known_chain(&self, chain_id: ChainId) {
        self.state().known_chains.insert(chain_id);
    }

    pub fn set_balance(&self, address: Address, balance: Wei) {
        self.state().balances.insert(address, balance);
    }

    pub fn balance_of(&self, address: &Address) -> Wei {
        self.state().balances.get(address).cloned().unwrap_or_default()
    }

    pub fn deploy(&self, address: Address, contract: Box<dyn MockContract>) {
        let mut state = self.state();
        state.code.insert(address, vec![0x60, 0x80, 0x60, 0x40]);
        state.contracts.insert(address, contract);
    }

    /// Number of `eth_getTransactionReceipt` polls answered with `null`
    /// before a receipt becomes visible.
    pub fn set_receipt_delay(&self, polls: usize) {
        self.state().receipt_delay = polls;
    }

    pub fn push_response(&self, method: &str, response: ProviderResult<Value>) {
        self.state()
            .scripted
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state().requests.clone()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub fn active_chain(&self) -> ChainId {
        self.state().chain_id
    }

    /// Simulates the user switching or disconnecting accounts in the wallet.
    pub fn change_accounts(&self, accounts: Vec<Address>) {
        self.state().accounts = accounts.clone();
        self.events.emit(ProviderEvent::AccountsChanged(accounts));
    }

    /// Simulates the user switching networks in the wallet.
    pub fn change_chain(&self, chain_id: ChainId) {
        {
            let mut state = self.state();
            state.chain_id = chain_id;
            state.known_chains.insert(chain_id);
        }
        self.events.emit(ProviderEvent::ChainChanged(chain_id));
    }

    fn handle(&self, method: &str, params: &Value) -> ProviderResult<Value> {
        let first = params.get(0).cloned().unwrap_or(Value::Null);
        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                let accounts = self.state().accounts.clone();
                Ok(json!(accounts.iter().map(Address::to_string).collect::<Vec<_>>()))
            }
            "eth_chainId" => Ok(json!(chain_id_hex(self.state().chain_id))),
            "eth_getBalance" => {
                let address = parse_param_address(method, &first)?;
                Ok(json!(self.balance_of(&address).to_quantity()))
            }
            "eth_getCode" => {
                let address = parse_param_address(method, &first)?;
                let code = self.state().code.get(&address).cloned().unwrap_or_default();
                Ok(json!(format!("0x{}", hex::encode(code))))
            }
            "wallet_switchEthereumChain" => {
                let chain_id = parse_param_chain(method, &first)?;
                if !self.state().known_chains.contains(&chain_id) {
                    return Err(ProviderError::rpc(
                        UNRECOGNIZED_CHAIN,
                        format!("Unrecognized chain ID \"{}\".", chain_id_hex(chain_id)),
                    ));
                }
                self.change_chain(chain_id);
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let chain_id = parse_param_chain(method, &first)?;
                self.change_chain(chain_id);
                Ok(Value::Null)
            }
            "eth_call" => {
                let to = parse_param_address(method, first.get("to").unwrap_or(&Value::Null))?;
                let data = parse_param_bytes(method, first.get("data"))?;
                let state = self.state();
                let Some(contract) = state.contracts.get(&to) else {
                    return Ok(json!("0x"));
                };
                contract
                    .call(&data)
                    .map(|output| json!(format!("0x{}", hex::encode(output))))
                    .map_err(reverted)
            }
            "eth_sendTransaction" => self.apply_transaction(&first),
            "eth_getTransactionReceipt" => {
                let hash: TxHash = first
                    .as_str()
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| invalid_params(method))?;
                let mut state = self.state();
                let Some(receipt) = state.receipts.get_mut(&hash) else {
                    return Ok(Value::Null);
                };
                if receipt.pending_polls > 0 {
                    receipt.pending_polls -= 1;
                    return Ok(Value::Null);
                }
                Ok(json!({
                    "transactionHash": hash.to_string(),
                    "blockNumber": format!("0x{:x}", receipt.block_number),
                    "status": if receipt.success { "0x1" } else { "0x0" },
                }))
            }
            other => Err(ProviderError::rpc(
                METHOD_NOT_FOUND,
                format!("method {other} not supported by mock provider"),
            )),
        }
    }

    fn apply_transaction(&self, tx: &Value) -> ProviderResult<Value> {
        let method = "eth_sendTransaction";
        let from = parse_param_address(method, tx.get("from").unwrap_or(&Value::Null))?;
        let to = parse_param_address(method, tx.get("to").unwrap_or(&Value::Null))?;
        let data = parse_param_bytes(method, tx.get("data"))?;
        let value = match tx.get("value").and_then(Value::as_str) {
            Some(raw) => Wei::from_quantity(raw).ok_or_else(|| invalid_params(method))?,
            None => Wei::zero(),
        };

        let mut state = self.state();
        if !state.accounts.contains(&from) {
            return Err(ProviderError::rpc(4100, "account not authorized"));
        }
        let sender_balance = state.balances.get(&from).cloned().unwrap_or_default();
        if value > sender_balance {
            return Err(ProviderError::rpc(-32000, "insufficient funds for transfer"));
        }
        if let Some(contract) = state.contracts.get_mut(&to) {
            contract.transact(from, &value, &data).map_err(reverted)?;
        }
        if !value.is_zero() {
            let remaining = sender_balance.into_natural() - value.as_natural();
            state.balances.insert(from, Wei::from_natural(remaining));
            let credited = state.balances.get(&to).cloned().unwrap_or_default().into_natural()
                + value.as_natural();
            state.balances.insert(to, Wei::from_natural(credited));
        }

        state.tx_count += 1;
        let digest = Keccak256::digest(format!("{from}:{to}:{}", state.tx_count).as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let hash = TxHash::new(bytes);
        let receipt = StoredReceipt {
            success: true,
            block_number: state.tx_count,
            pending_polls: state.receipt_delay,
        };
        state.receipts.insert(hash, receipt);
        Ok(json!(hash.to_string()))
    }
}

fn reverted(data: Vec<u8>) -> ProviderError {
    let message = match decode_revert_reason(&data) {
        Some(reason) => format!("execution reverted: {reason}"),
        None => "execution reverted".to_string(),
    };
    ProviderError::Rpc {
        code: EXECUTION_REVERTED,
        message,
        data: Some(json!(format!("0x{}", hex::encode(data)))),
    }
}

fn invalid_params(method: &str) -> ProviderError {
    ProviderError::rpc(-32602, format!("invalid params for {method}"))
}

fn parse_param_address(method: &str, value: &Value) -> ProviderResult<Address> {
    value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| invalid_params(method))
}

fn parse_param_chain(method: &str, value: &Value) -> ProviderResult<ChainId> {
    value
        .get("chainId")
        .and_then(Value::as_str)
        .and_then(parse_quantity)
        .ok_or_else(|| invalid_params(method))
}

fn parse_param_bytes(method: &str, value: Option<&Value>) -> ProviderResult<Vec<u8>> {
    match value.and_then(Value::as_str) {
        Some(raw) => raw
            .strip_prefix("0x")
            .and_then(|digits| hex::decode(digits).ok())
            .ok_or_else(|| invalid_params(method)),
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let scripted = {
            let mut state = self.state();
            state.requests.push((method.to_string(), params.clone()));
            state
                .scripted
                .get_mut(method)
                .and_then(|queue| queue.pop_front())
        };
        match scripted {
            Some(response) => response,
            None => self.handle(method, &params),
        }
    }

    fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }
}

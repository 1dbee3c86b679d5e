use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract::DEFAULT_CONFIRMATION_POLL_MS;
use crate::deployment::DeploymentRecord;
use crate::errors::{DappError, DappResult};
use crate::network::{NetworkDescriptor, NetworkRegistry, HARDHAT_CHAIN_ID};
use crate::payment::DEFAULT_PAYMENT_MEMO;
use crate::types::{Address, ChainId};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BALLOT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const DEFAULT_PAYMENT_ADDRESS: &str = "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9";

pub const BALLOT_CONTRACT_NAME: &str = "Ballot";
pub const PAYMENT_CONTRACT_NAME: &str = "PaymentAccount";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub contracts: ContractsConfig,
    pub session: SessionConfig,
    pub networks: Vec<NetworkDescriptor>,
}

impl AppConfig {
    pub fn load(path: &Path) -> DappResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| DappError::Config(format!("unable to parse config: {err}")))
    }

    pub fn save(&self, path: &Path) -> DappResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| DappError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads `path`, writing the defaults there first when it does not exist.
    pub fn load_or_init(path: &Path) -> DappResult<Self> {
        if !path.exists() {
            Self::default().save(path)?;
        }
        Self::load(path)
    }

    /// Built-in networks plus the configured overrides.
    pub fn registry(&self) -> NetworkRegistry {
        let mut registry = NetworkRegistry::builtin();
        for descriptor in &self.networks {
            registry.insert(descriptor.clone());
        }
        registry
    }

    /// Ballot address, taken from the deployment record when one is configured.
    pub fn ballot_address(&self) -> DappResult<Address> {
        self.contract_address(BALLOT_CONTRACT_NAME, &self.contracts.ballot)
    }

    pub fn payment_address(&self) -> DappResult<Address> {
        self.contract_address(PAYMENT_CONTRACT_NAME, &self.contracts.payment)
    }

    fn contract_address(&self, name: &str, configured: &str) -> DappResult<Address> {
        if let Some(path) = &self.contracts.deployment_record {
            let record = DeploymentRecord::load(path)?;
            if let Some(address) = record.contract_address(name) {
                return Ok(address);
            }
        }
        configured
            .parse()
            .map_err(|err| DappError::Config(format!("invalid {name} address `{configured}`: {err}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub rpc_url: String,
    pub request_timeout_ms: u64,
    pub auth_token: Option<String>,
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            auth_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub ballot: String,
    pub payment: String,
    pub deployment_record: Option<PathBuf>,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            ballot: DEFAULT_BALLOT_ADDRESS.to_string(),
            payment: DEFAULT_PAYMENT_ADDRESS.to_string(),
            deployment_record: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub required_chain_id: Option<ChainId>,
    pub confirmation_poll_ms: u64,
    pub payment_memo: String,
}

impl SessionConfig {
    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            required_chain_id: Some(HARDHAT_CHAIN_ID),
            confirmation_poll_ms: DEFAULT_CONFIRMATION_POLL_MS,
            payment_memo: DEFAULT_PAYMENT_MEMO.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NativeCurrency;
    use tempfile::tempdir;

    #[test]
    fn defaults_round_trip_through_toml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config/vote-web3.toml");
        let config = AppConfig::load_or_init(&path).expect("init");
        assert!(path.exists());
        assert_eq!(config.provider.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.session.required_chain_id, Some(HARDHAT_CHAIN_ID));
        assert_eq!(
            config.ballot_address().expect("ballot").to_string(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            r#"
[session]
confirmation_poll_ms = 250

[[networks]]
chain_id = 31337
name = "Anvil"
rpc_url = "http://127.0.0.1:8545"
supported = true
"#,
        )
        .expect("write");
        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.session.confirmation_poll_interval(), Duration::from_millis(250));
        assert_eq!(config.session.payment_memo, DEFAULT_PAYMENT_MEMO);
        assert_eq!(config.provider.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);

        let registry = config.registry();
        let anvil = registry.get(31337).expect("anvil");
        assert_eq!(anvil.native_currency, NativeCurrency::ether());
        assert!(registry.resolve(31337).is_supported);
    }

    #[test]
    fn malformed_files_are_config_errors() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "provider = 5").expect("write");
        assert!(matches!(AppConfig::load(&path), Err(DappError::Config(_))));
    }

    #[test]
    fn invalid_addresses_are_reported() {
        let mut config = AppConfig::default();
        config.contracts.payment = "0x1234".to_string();
        assert!(matches!(config.payment_address(), Err(DappError::Config(_))));
    }
}

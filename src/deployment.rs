//! Deployment record written by the contract deploy script.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{DappError, DappResult};
use crate::types::{Address, ChainId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub network: String,
    #[serde(deserialize_with = "chain_id_from_number_or_string")]
    pub chain_id: ChainId,
    pub timestamp: String,
    pub deployer: Address,
    pub contracts: BTreeMap<String, DeployedContract>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
    pub address: Address,
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    /// Script-specific fields such as the proposal names.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn chain_id_from_number_or_string<'de, D>(deserializer: D) -> Result<ChainId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim_end_matches('n')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid chain id `{text}`"))),
    }
}

impl DeploymentRecord {
    pub fn load(path: &Path) -> DappResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> DappResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| DappError::Config(format!("unable to parse deployment record: {err}")))
    }

    pub fn contract_address(&self, name: &str) -> Option<Address> {
        self.contracts.get(name).map(|contract| contract.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "network": "unknown",
        "chainId": "1337",
        "timestamp": "2024-05-01T12:00:00.000Z",
        "deployer": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        "contracts": {
            "Ballot": {
                "address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "proposalNames": ["Increase Mining Rewards", "Lower Transaction Fees"],
                "constructorArgs": [["0x496e637265617365204d696e696e67205265776172647300000000000000000000"]]
            }
        }
    }"#;

    #[test]
    fn parses_script_output() {
        let record = DeploymentRecord::from_json(RECORD).expect("record");
        assert_eq!(record.chain_id, 1337);
        let ballot = record.contract_address("Ballot").expect("ballot");
        assert_eq!(ballot.to_string(), "0x5fbdb2315678afecb367f032d93f642f64180aa3");
        let extra = &record.contracts["Ballot"].extra;
        assert_eq!(extra["proposalNames"][1], "Lower Transaction Fees");
        assert!(record.contract_address("PaymentAccount").is_none());
    }

    #[test]
    fn numeric_chain_ids_are_accepted() {
        let numeric = RECORD.replace("\"1337\"", "11155111");
        assert_eq!(DeploymentRecord::from_json(&numeric).expect("record").chain_id, 11_155_111);
        assert!(matches!(
            DeploymentRecord::from_json("{}"),
            Err(DappError::Config(_))
        ));
    }
}

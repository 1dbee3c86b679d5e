//! Ballot contract client.
//!
//! Reads proposals and voter records and dispatches votes. Proposal names
//! are stored on chain as zero-padded `bytes32` values and are decoded to
//! text here. The client caches the last loaded proposals and the voter
//! record of the account it was loaded for; a vote is only submitted when
//! that cached record exists for the connected account and says the account
//! has not voted.

use std::time::Duration;

use malachite::Natural;
use serde::Serialize;
use tracing::{info, warn};

use crate::abi::{decode_bytes32_string, AbiValue, ContractAbi};
use crate::contract::{
    unexpected_output, wait_for_confirmation, ContractHandle, DEFAULT_CONFIRMATION_POLL_MS,
};
use crate::errors::{DappError, DappResult};
use crate::provider::TransactionReceipt;
use crate::session::SessionManager;
use crate::types::Address;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub index: usize,
    pub name: String,
    #[serde(serialize_with = "serialize_natural")]
    pub vote_count: Natural,
}

fn serialize_natural<S: serde::Serializer>(value: &Natural, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VoterRecord {
    pub voted: bool,
    pub choice_index: u64,
}

pub struct BallotClient {
    contract: ContractHandle,
    poll_interval: Duration,
    proposals: Vec<Proposal>,
    voter: Option<(Address, VoterRecord)>,
    loading: bool,
}

impl BallotClient {
    pub fn new(address: Address) -> DappResult<Self> {
        Ok(Self::with_contract(ContractHandle::new(
            address,
            ContractAbi::ballot()?,
        )))
    }

    pub fn with_contract(contract: ContractHandle) -> Self {
        Self {
            contract,
            poll_interval: Duration::from_millis(DEFAULT_CONFIRMATION_POLL_MS),
            proposals: Vec::new(),
            voter: None,
            loading: false,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    /// Cached voter record, if one was loaded for `account`.
    pub fn voter_record(&self, account: Address) -> Option<VoterRecord> {
        self.voter
            .filter(|(owner, _)| *owner == account)
            .map(|(_, record)| record)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the connected account has a loaded record that permits voting.
    pub fn can_vote(&self, session: &SessionManager) -> bool {
        session
            .require_account()
            .ok()
            .and_then(|account| self.voter_record(account))
            .map_or(false, |record| !record.voted)
    }

    /// Loads every proposal in on-chain order. Fails with
    /// [`DappError::ContractNotFound`] when the address has no code.
    pub async fn load_proposals(&mut self, session: &SessionManager) -> DappResult<&[Proposal]> {
        let provider = session.provider()?;
        self.contract.ensure_deployed(provider.as_ref()).await?;
        let outputs = self
            .contract
            .call(provider.as_ref(), "getProposals", &[])
            .await?;
        let entries = outputs
            .first()
            .and_then(AbiValue::as_array)
            .ok_or_else(|| unexpected_output("tuple[]"))?;
        self.proposals = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let fields = entry.as_tuple().ok_or_else(|| unexpected_output("tuple"))?;
                decode_proposal(index, fields)
            })
            .collect::<DappResult<Vec<_>>>()?;
        info!(contract = %self.address(), count = self.proposals.len(), "proposals loaded");
        Ok(&self.proposals)
    }

    pub async fn load_voter_record(
        &mut self,
        session: &SessionManager,
        account: Address,
    ) -> DappResult<VoterRecord> {
        let provider = session.provider()?;
        let outputs = self
            .contract
            .call(provider.as_ref(), "voters", &[AbiValue::Address(account)])
            .await?;
        let voted = outputs
            .first()
            .and_then(AbiValue::as_bool)
            .ok_or_else(|| unexpected_output("bool"))?;
        let choice_index = outputs
            .get(1)
            .and_then(AbiValue::as_u64)
            .ok_or_else(|| unexpected_output("uint256"))?;
        let record = VoterRecord {
            voted,
            choice_index,
        };
        self.voter = Some((account, record));
        Ok(record)
    }

    /// Reloads proposals and, when connected, the account's voter record.
    pub async fn refresh(&mut self, session: &SessionManager) -> DappResult<()> {
        self.loading = true;
        let result = self.reload(session).await;
        self.loading = false;
        if let Err(err) = &result {
            warn!(contract = %self.address(), error = %err, "loading ballot data failed");
        }
        result
    }

    async fn reload(&mut self, session: &SessionManager) -> DappResult<()> {
        self.load_proposals(session).await?;
        if let Some(account) = session.account() {
            self.load_voter_record(session, account).await?;
        }
        Ok(())
    }

    /// Single `proposals(index)` read.
    pub async fn proposal(&self, session: &SessionManager, index: usize) -> DappResult<Proposal> {
        let provider = session.provider()?;
        let outputs = self
            .contract
            .call(provider.as_ref(), "proposals", &[AbiValue::uint(index as u64)])
            .await?;
        decode_proposal(index, &outputs)
    }

    pub async fn winner_name(&self, session: &SessionManager) -> DappResult<String> {
        let provider = session.provider()?;
        let outputs = self.contract.call(provider.as_ref(), "winnerName", &[]).await?;
        let raw = outputs
            .first()
            .and_then(AbiValue::as_fixed_bytes)
            .ok_or_else(|| unexpected_output("bytes32"))?;
        Ok(decode_bytes32_string(raw)?)
    }

    pub async fn winning_proposal(&self, session: &SessionManager) -> DappResult<usize> {
        let provider = session.provider()?;
        let outputs = self
            .contract
            .call(provider.as_ref(), "winningProposal", &[])
            .await?;
        outputs
            .first()
            .and_then(AbiValue::as_u64)
            .and_then(|index| usize::try_from(index).ok())
            .ok_or_else(|| unexpected_output("uint256"))
    }

    /// Casts a vote for `index` and waits for one confirmation, then reloads
    /// proposals and the voter record.
    ///
    /// Every precondition is checked against the cached state before the
    /// provider is contacted: the wallet must be connected, the voter record
    /// loaded for that account and not yet voted, and `index` within the
    /// loaded proposals. A rejected or reverted transaction is never retried.
    pub async fn vote(
        &mut self,
        session: &SessionManager,
        index: usize,
    ) -> DappResult<TransactionReceipt> {
        let account = session.require_account()?;
        let record = self
            .voter_record(account)
            .ok_or(DappError::VoterRecordUnavailable)?;
        if record.voted {
            return Err(DappError::AlreadyVoted);
        }
        if index >= self.proposals.len() {
            return Err(DappError::ProposalOutOfRange {
                index,
                count: self.proposals.len(),
            });
        }

        self.loading = true;
        let result = self.submit_vote(session, account, index).await;
        self.loading = false;
        match &result {
            Ok(receipt) => info!(%account, index, hash = %receipt.transaction_hash, "vote recorded"),
            Err(err) => warn!(%account, index, error = %err, "vote failed"),
        }
        result
    }

    async fn submit_vote(
        &mut self,
        session: &SessionManager,
        account: Address,
        index: usize,
    ) -> DappResult<TransactionReceipt> {
        let provider = session.provider()?;
        let hash = self
            .contract
            .send(
                provider.as_ref(),
                account,
                "vote",
                &[AbiValue::uint(index as u64)],
                None,
            )
            .await?;
        let receipt = wait_for_confirmation(provider.as_ref(), hash, self.poll_interval).await?;
        self.reload(session).await?;
        Ok(receipt)
    }
}

fn decode_proposal(index: usize, fields: &[AbiValue]) -> DappResult<Proposal> {
    let raw_name = fields
        .first()
        .and_then(AbiValue::as_fixed_bytes)
        .ok_or_else(|| unexpected_output("bytes32"))?;
    let vote_count = fields
        .get(1)
        .and_then(AbiValue::as_uint)
        .cloned()
        .ok_or_else(|| unexpected_output("uint256"))?;
    Ok(Proposal {
        index,
        name: decode_bytes32_string(raw_name)?,
        vote_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposals_decode_trimmed_names() {
        let mut name = [0u8; 32];
        name[..5].copy_from_slice(b"Alice");
        let proposal = decode_proposal(
            2,
            &[AbiValue::FixedBytes(name.to_vec()), AbiValue::uint(7)],
        )
        .expect("proposal");
        assert_eq!(proposal.name, "Alice");
        assert_eq!(proposal.index, 2);
        assert_eq!(proposal.vote_count, Natural::from(7u32));
    }

    #[test]
    fn malformed_proposal_fields_are_rejected() {
        assert!(decode_proposal(0, &[AbiValue::Bool(true)]).is_err());
        assert!(decode_proposal(0, &[]).is_err());
    }

    #[test]
    fn voter_record_is_scoped_to_account() {
        let mut client = BallotClient::new(Address::new([1; 20])).expect("client");
        let record = VoterRecord {
            voted: false,
            choice_index: 0,
        };
        client.voter = Some((Address::new([2; 20]), record));
        assert_eq!(client.voter_record(Address::new([2; 20])), Some(record));
        assert_eq!(client.voter_record(Address::new([3; 20])), None);
    }
}

//! Wallet session management.
//!
//! [`SessionManager`] owns the provider handle and the connection state of a
//! single wallet. Provider notifications are queued on a scoped subscription
//! that lives exactly as long as the connection; callers drain it through
//! [`SessionManager::process_events`] (or wait with
//! [`SessionManager::next_event`]) and reload whatever depends on the account
//! or chain.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{DappError, DappResult};
use crate::network::{NetworkInfo, NetworkRegistry};
use crate::provider::{Eip1193Provider, EventSubscription, ProviderEvent};
use crate::types::{Address, ChainId};
use crate::units::format_ether;

/// Connection state of the wallet. The default value is the disconnected state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    pub connected: bool,
    pub account: Option<Address>,
    pub chain_id: Option<ChainId>,
    /// Native balance in ether, as read at connect time.
    pub balance: Option<String>,
    pub network: Option<NetworkInfo>,
}

pub struct SessionManager {
    provider: Option<Arc<dyn Eip1193Provider>>,
    registry: NetworkRegistry,
    session: WalletSession,
    subscription: Option<EventSubscription>,
    loading: bool,
}

impl SessionManager {
    pub fn new(provider: Option<Arc<dyn Eip1193Provider>>, registry: NetworkRegistry) -> Self {
        Self {
            provider,
            registry,
            session: WalletSession::default(),
            subscription: None,
            loading: false,
        }
    }

    pub fn with_provider(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self::new(Some(provider), NetworkRegistry::builtin())
    }

    pub fn provider(&self) -> DappResult<&Arc<dyn Eip1193Provider>> {
        self.provider.as_ref().ok_or(DappError::NoProvider)
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn account(&self) -> Option<Address> {
        self.session.account
    }

    /// Connected account, or [`DappError::NotConnected`].
    pub fn require_account(&self) -> DappResult<Address> {
        match (self.session.connected, self.session.account) {
            (true, Some(account)) => Ok(account),
            _ => Err(DappError::NotConnected),
        }
    }

    /// Connects the wallet, switching to `required` first when the active
    /// chain differs from it.
    pub async fn connect(&mut self, required: Option<ChainId>) -> DappResult<&WalletSession> {
        self.loading = true;
        let result = self.establish(required).await;
        self.loading = false;
        match result {
            Ok(()) => Ok(&self.session),
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                self.session = WalletSession::default();
                self.subscription = None;
                Err(err)
            }
        }
    }

    async fn establish(&mut self, required: Option<ChainId>) -> DappResult<()> {
        let provider = Arc::clone(self.provider()?);
        let mut network = self.check_network().await?;

        if let Some(expected) = required {
            if network.chain_id != expected {
                info!(
                    active = %network.name,
                    expected,
                    "active network differs from required network"
                );
                if !self.switch_to_network(expected).await {
                    return Err(DappError::NetworkMismatch {
                        expected,
                        actual: Some(network.chain_id),
                    });
                }
                network = self.check_network().await?;
                if network.chain_id != expected {
                    return Err(DappError::NetworkMismatch {
                        expected,
                        actual: Some(network.chain_id),
                    });
                }
            }
        }

        let accounts = provider.request_accounts().await?;
        let account = *accounts.first().ok_or(DappError::NoAccounts)?;
        let balance = provider.balance(account).await?;

        let chain_id = network.chain_id;
        self.session = WalletSession {
            connected: true,
            account: Some(account),
            chain_id: Some(chain_id),
            balance: Some(format_ether(&balance)),
            network: Some(network),
        };
        self.subscription = Some(provider.events().subscribe());
        info!(%account, chain_id, "wallet connected");
        Ok(())
    }

    /// Clears the session and drops the event subscription. Idempotent.
    pub fn disconnect(&mut self) {
        let was_connected = self.session.connected;
        self.session = WalletSession::default();
        self.subscription = None;
        if was_connected {
            info!("wallet disconnected");
        }
    }

    /// Re-reads the active chain and records the resolved network.
    pub async fn check_network(&mut self) -> DappResult<NetworkInfo> {
        let chain_id = self.provider()?.chain_id().await?;
        let network = self.registry.resolve(chain_id);
        debug!(chain_id, name = %network.name, supported = network.is_supported, "active network");
        self.session.chain_id = Some(chain_id);
        self.session.network = Some(network.clone());
        Ok(network)
    }

    /// Asks the wallet to switch to `chain_id`, registering the chain once if
    /// the wallet reports it as unknown (4902). Failures are logged and
    /// reported as `false`.
    pub async fn switch_to_network(&self, chain_id: ChainId) -> bool {
        let Some(descriptor) = self.registry.get(chain_id) else {
            warn!(chain_id, "network not in registry");
            return false;
        };
        let Ok(provider) = self.provider() else {
            return false;
        };

        match provider.switch_chain(chain_id).await {
            Ok(()) => {
                info!(chain_id, name = %descriptor.name, "switched network");
                true
            }
            Err(err) if err.is_unrecognized_chain() => {
                match provider.add_chain(descriptor.add_chain_params()).await {
                    Ok(()) => {
                        info!(chain_id, name = %descriptor.name, "added network to wallet");
                        true
                    }
                    Err(err) => {
                        warn!(chain_id, error = %err, "adding network failed");
                        false
                    }
                }
            }
            Err(err) => {
                warn!(chain_id, error = %err, "switching network failed");
                false
            }
        }
    }

    /// Whether code is deployed at `address` on the active chain.
    pub async fn contract_exists(&self, address: Address) -> DappResult<bool> {
        let code = self.provider()?.code(address).await?;
        Ok(!code.is_empty())
    }

    /// Re-reads the native balance of the connected account.
    pub async fn refresh_balance(&mut self) -> DappResult<String> {
        let account = self.require_account()?;
        let balance = format_ether(&self.provider()?.balance(account).await?);
        self.session.balance = Some(balance.clone());
        Ok(balance)
    }

    /// Applies every queued provider event and returns them in order.
    pub fn process_events(&mut self) -> Vec<ProviderEvent> {
        let mut applied = Vec::new();
        while let Some(event) = self.subscription.as_mut().and_then(EventSubscription::try_next) {
            self.handle_event(&event);
            applied.push(event);
        }
        applied
    }

    /// Waits for the next provider event and applies it. Returns `None` when
    /// there is no live subscription.
    pub async fn next_event(&mut self) -> Option<ProviderEvent> {
        let event = self.subscription.as_mut()?.next().await?;
        self.handle_event(&event);
        Some(event)
    }

    pub fn handle_event(&mut self, event: &ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    info!("wallet reported no accounts");
                    self.disconnect();
                }
                Some(account) if self.session.connected => {
                    info!(%account, "account changed");
                    self.session.account = Some(*account);
                }
                Some(_) => {}
            },
            ProviderEvent::ChainChanged(chain_id) => {
                let network = self.registry.resolve(*chain_id);
                info!(chain_id, name = %network.name, "network changed");
                self.session.chain_id = Some(*chain_id);
                self.session.network = Some(network);
            }
        }
    }
}

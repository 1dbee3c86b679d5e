//! Client library for the vote-web3 ballot and payment contracts.
//!
//! A [`session::SessionManager`] wraps an EIP-1193 style wallet provider and
//! tracks the connected account, chain and balance. The [`ballot`] and
//! [`payment`] clients read contract state and dispatch writes through that
//! session, waiting for one confirmation per transaction. The [`network`]
//! registry maps chain ids to metadata used when validating or switching
//! networks, and [`format`], [`calc`] and [`units`] hold the pure display and
//! fixed-point helpers.
//!
//! Applications typically load an [`config::AppConfig`], build a provider
//! (for example [`provider::HttpProvider`]) and hand it to a session manager.

pub mod abi;
pub mod ballot;
pub mod calc;
pub mod config;
pub mod contract;
pub mod deployment;
pub mod errors;
pub mod format;
pub mod network;
pub mod payment;
pub mod provider;
pub mod session;
pub mod types;
pub mod units;

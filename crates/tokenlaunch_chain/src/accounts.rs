use alloy::primitives::Address;
use alloy::providers::Provider;
use async_trait::async_trait;
use thiserror::Error;
use tokenlaunch_core::{Categorized, ErrorCategory, NamedAccounts};
use tracing::debug;

use crate::connection::ChainConnection;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Named account {role} maps to index {index}, but only {available} accounts are available")]
    IndexOutOfRange {
        role: &'static str,
        index: usize,
        available: usize,
    },

    #[error("Failed to list node accounts: {0}")]
    Rpc(String),
}

impl Categorized for AccountError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::IndexOutOfRange { .. } => ErrorCategory::Config,
            Self::Rpc(_) => ErrorCategory::Network,
        }
    }
}

/// Maps role names used by deploy scripts to concrete addresses.
#[async_trait]
pub trait NamedAccountResolver: Send + Sync {
    /// The account that sends deployment transactions.
    async fn deployer(&self) -> Result<Address, AccountError>;
}

/// Pick the account at `index`, as configured for `role`.
pub fn select_account(
    role: &'static str,
    accounts: &[Address],
    index: usize,
) -> Result<Address, AccountError> {
    accounts
        .get(index)
        .copied()
        .ok_or(AccountError::IndexOutOfRange {
            role,
            index,
            available: accounts.len(),
        })
}

/// Resolves named accounts against the connection's local signers, or the
/// node's own accounts when no keys are configured.
pub struct ConfiguredAccounts {
    connection: ChainConnection,
    rules: NamedAccounts,
}

impl ConfiguredAccounts {
    pub fn new(connection: ChainConnection, rules: NamedAccounts) -> Self {
        Self { connection, rules }
    }

    async fn available(&self) -> Result<Vec<Address>, AccountError> {
        if !self.connection.signers.is_empty() {
            return Ok(self.connection.signers.iter().map(|s| s.address()).collect());
        }
        self.connection
            .provider
            .get_accounts()
            .await
            .map_err(|e| AccountError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl NamedAccountResolver for ConfiguredAccounts {
    async fn deployer(&self) -> Result<Address, AccountError> {
        let chain_id = self.connection.network.chain_id;
        let index = self.rules.deployer_index(chain_id);
        let accounts = self.available().await?;
        let deployer = select_account("deployer", &accounts, index)?;
        debug!(chain_id, index, %deployer, "resolved deployer");
        Ok(deployer)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tokenlaunch_core::{AccountRule, Network, NetworkRegistry};

    use super::*;
    use crate::connection::test_support::*;

    fn sepolia_connection(keys: &[&str]) -> ChainConnection {
        let mut registry = NetworkRegistry::with_defaults();
        registry
            .set_custom_rpc(Network::Sepolia, "http://127.0.0.1:1".into())
            .unwrap();
        let mut config = registry.get(Network::Sepolia).unwrap().clone();
        config.accounts = keys.iter().map(|k| k.to_string()).collect();
        ChainConnection::connect(&config).unwrap()
    }

    #[test]
    fn select_account_by_index() {
        let accounts = [Address::from([1; 20]), Address::from([2; 20])];
        assert_eq!(select_account("deployer", &accounts, 1).unwrap(), accounts[1]);

        let err = select_account("deployer", &accounts, 2).unwrap_err();
        assert!(matches!(
            err,
            AccountError::IndexOutOfRange { index: 2, available: 2, .. }
        ));
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[tokio::test]
    async fn deployer_defaults_to_first_signer() {
        let accounts = ConfiguredAccounts::new(
            sepolia_connection(&[DEV_KEY_0, DEV_KEY_1]),
            NamedAccounts::default(),
        );
        assert_eq!(
            accounts.deployer().await.unwrap(),
            DEV_ADDR_0.parse::<Address>().unwrap()
        );
    }

    #[tokio::test]
    async fn per_chain_rule_selects_other_signer() {
        let rules = NamedAccounts {
            deployer: AccountRule {
                default: 0,
                per_chain: BTreeMap::from([(11155111, 1)]),
            },
        };
        let accounts = ConfiguredAccounts::new(sepolia_connection(&[DEV_KEY_0, DEV_KEY_1]), rules);
        assert_eq!(
            accounts.deployer().await.unwrap(),
            DEV_ADDR_1.parse::<Address>().unwrap()
        );
    }

    #[tokio::test]
    async fn unreachable_node_without_keys_is_network_error() {
        let accounts = ConfiguredAccounts::new(sepolia_connection(&[]), NamedAccounts::default());
        let err = accounts.deployer().await.unwrap_err();
        assert!(matches!(err, AccountError::Rpc(_)));
        assert_eq!(err.category(), ErrorCategory::Network);
    }
}

use std::str::FromStr;

use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::{LocalSignerError, PrivateKeySigner};
use thiserror::Error;
use tokenlaunch_core::{Categorized, ErrorCategory, NetworkConfig};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("No RPC URL configured for {0}")]
    MissingUrl(String),

    #[error("Invalid RPC URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Account #{index} is not a valid private key: {source}")]
    InvalidKey {
        index: usize,
        #[source]
        source: LocalSignerError,
    },

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Chain ID mismatch: configured {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}

impl Categorized for ConnectError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Rpc(_) => ErrorCategory::Network,
            _ => ErrorCategory::Config,
        }
    }
}

/// An HTTP JSON-RPC connection to the selected network plus the local
/// signers configured for it.
///
/// Without configured keys the node is expected to sign for its own unlocked
/// accounts, as local development nodes do.
#[derive(Clone)]
pub struct ChainConnection {
    pub network: NetworkConfig,
    pub provider: DynProvider,
    pub signers: Vec<PrivateKeySigner>,
}

impl std::fmt::Debug for ChainConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConnection")
            .field("network", &self.network)
            .field("signers", &self.signers.iter().map(|s| s.address()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Parse every configured private key, keeping their order.
pub fn parse_signers(keys: &[String]) -> Result<Vec<PrivateKeySigner>, ConnectError> {
    keys.iter()
        .enumerate()
        .map(|(index, key)| {
            PrivateKeySigner::from_str(key.trim())
                .map_err(|source| ConnectError::InvalidKey { index, source })
        })
        .collect()
}

impl ChainConnection {
    /// Build the provider for `network`. No request is made until the first call.
    pub fn connect(network: &NetworkConfig) -> Result<Self, ConnectError> {
        let url = network
            .url
            .as_deref()
            .ok_or_else(|| ConnectError::MissingUrl(network.network.name().to_string()))?;
        let rpc_url = url
            .parse::<reqwest::Url>()
            .map_err(|e| ConnectError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let signers = parse_signers(&network.accounts)?;
        let provider = match signers.split_first() {
            Some((first, rest)) => {
                let mut wallet = EthereumWallet::from(first.clone());
                for signer in rest {
                    wallet.register_signer(signer.clone());
                }
                ProviderBuilder::new()
                    .wallet(wallet)
                    .connect_http(rpc_url)
                    .erased()
            }
            None => {
                debug!(network = network.network.name(), "no local keys, using node accounts");
                ProviderBuilder::new().connect_http(rpc_url).erased()
            }
        };

        info!(network = network.network.name(), url = %url, signers = signers.len(), "connected");
        Ok(Self {
            network: network.clone(),
            provider,
            signers,
        })
    }

    /// Confirm the node serves the chain the configuration expects.
    pub async fn check_chain_id(&self) -> Result<u64, ConnectError> {
        let actual = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ConnectError::Rpc(e.to_string()))?;
        if actual != self.network.chain_id {
            return Err(ConnectError::ChainIdMismatch {
                expected: self.network.chain_id,
                actual,
            });
        }
        Ok(actual)
    }
}

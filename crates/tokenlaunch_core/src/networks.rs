use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Networks the deploy pipeline knows how to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Network {
    Hardhat,
    Localhost,
    Sepolia,
    Mainnet,
    Polygon,
    PolygonMumbai,
    BscTestnet,
    OptimisticGoerli,
    ArbitrumGoerli,
    PolygonZkEvmTestnet,
}

impl Network {
    pub const ALL: [Network; 10] = [
        Network::Hardhat,
        Network::Localhost,
        Network::Sepolia,
        Network::Mainnet,
        Network::Polygon,
        Network::PolygonMumbai,
        Network::BscTestnet,
        Network::OptimisticGoerli,
        Network::ArbitrumGoerli,
        Network::PolygonZkEvmTestnet,
    ];

    /// Config-file name of the network (also the deployments sub-directory).
    pub fn name(&self) -> &'static str {
        match self {
            Network::Hardhat => "hardhat",
            Network::Localhost => "localhost",
            Network::Sepolia => "sepolia",
            Network::Mainnet => "mainnet",
            Network::Polygon => "polygon",
            Network::PolygonMumbai => "polygonMumbai",
            Network::BscTestnet => "bscTestnet",
            Network::OptimisticGoerli => "optimisticGoerli",
            Network::ArbitrumGoerli => "arbitrumGoerli",
            Network::PolygonZkEvmTestnet => "polygonZkEvmTestnet",
        }
    }

    /// Human-readable label for the network.
    pub fn label(&self) -> &'static str {
        match self {
            Network::Hardhat => "Hardhat (in-process)",
            Network::Localhost => "Localhost",
            Network::Sepolia => "Sepolia Testnet",
            Network::Mainnet => "Ethereum Mainnet",
            Network::Polygon => "Polygon Mainnet",
            Network::PolygonMumbai => "Polygon Mumbai",
            Network::BscTestnet => "BSC Testnet",
            Network::OptimisticGoerli => "Optimism Goerli",
            Network::ArbitrumGoerli => "Arbitrum Goerli",
            Network::PolygonZkEvmTestnet => "Polygon zkEVM Testnet",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Hardhat | Network::Localhost => 31337,
            Network::Sepolia => 11155111,
            Network::Mainnet => 1,
            Network::Polygon => 137,
            Network::PolygonMumbai => 80001,
            Network::BscTestnet => 97,
            Network::OptimisticGoerli => 420,
            Network::ArbitrumGoerli => 421613,
            Network::PolygonZkEvmTestnet => 1442,
        }
    }

    /// Local development networks mine on demand and are never persisted.
    pub fn is_dev(&self) -> bool {
        matches!(self, Network::Hardhat | Network::Localhost)
    }

    /// Look a network up by name. Accepts the config-file spelling as well as
    /// lower-case and kebab-case forms (`polygon-mumbai`).
    pub fn from_name(name: &str) -> Option<Network> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Network::ALL
            .into_iter()
            .find(|n| n.name().to_lowercase() == normalized)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::from_name(s).ok_or_else(|| ConfigError::UnknownNetwork(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Per-network configuration
// ---------------------------------------------------------------------------

/// Block explorer endpoints used for source verification.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub api_url: String,
    pub browser_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ExplorerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorerConfig")
            .field("api_url", &self.api_url)
            .field("browser_url", &self.browser_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Connection settings for a single network.
///
/// `accounts` holds raw private keys and is never serialized or printed.
#[derive(Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: Network,
    pub chain_id: u64,
    pub url: Option<String>,
    #[serde(skip)]
    pub accounts: Vec<String>,
    pub save_deployments: bool,
    pub is_custom: bool,
    pub explorer: Option<ExplorerConfig>,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field("url", &self.url)
            .field("accounts", &format_args!("[{} keys]", self.accounts.len()))
            .field("save_deployments", &self.save_deployments)
            .field("is_custom", &self.is_custom)
            .field("explorer", &self.explorer)
            .finish()
    }
}

fn explorer(api_url: &str, browser_url: &str) -> Option<ExplorerConfig> {
    Some(ExplorerConfig {
        api_url: api_url.to_string(),
        browser_url: browser_url.to_string(),
        api_key: None,
    })
}

/// Built-in defaults for a network: chain ID, public RPC (where one exists)
/// and explorer endpoints.
pub fn default_network_config(network: Network) -> NetworkConfig {
    let (url, explorer) = match network {
        Network::Hardhat => (None, None),
        Network::Localhost => (Some("http://127.0.0.1:8545"), None),
        Network::Sepolia => (
            None,
            explorer("https://api-sepolia.etherscan.io/api", "https://sepolia.etherscan.io"),
        ),
        Network::Mainnet => (
            None,
            explorer("https://api.etherscan.io/api", "https://etherscan.io"),
        ),
        Network::Polygon => (
            None,
            explorer("https://api.polygonscan.com/api", "https://polygonscan.com"),
        ),
        Network::PolygonMumbai => (
            Some("https://rpc-mumbai.maticvigil.com"),
            explorer(
                "https://api-testnet.polygonscan.com/api",
                "https://mumbai.polygonscan.com",
            ),
        ),
        Network::BscTestnet => (
            None,
            explorer("https://api-testnet.bscscan.com/api", "https://testnet.bscscan.com"),
        ),
        Network::OptimisticGoerli => (
            None,
            explorer(
                "https://api-goerli-optimism.etherscan.io/api",
                "https://goerli-optimism.etherscan.io",
            ),
        ),
        Network::ArbitrumGoerli => (
            None,
            explorer("https://api-goerli.arbiscan.io/api", "https://goerli.arbiscan.io"),
        ),
        Network::PolygonZkEvmTestnet => (
            None,
            explorer(
                "https://api-zkevm.polygonscan.com/api",
                "https://testnet-zkevm.polygonscan.com",
            ),
        ),
    };

    NetworkConfig {
        network,
        chain_id: network.chain_id(),
        url: url.map(str::to_string),
        accounts: Vec::new(),
        save_deployments: !network.is_dev(),
        is_custom: false,
        explorer,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Environment variables holding RPC URLs, in priority order per network.
const RPC_ENV: &[(Network, &[&str])] = &[
    (Network::Mainnet, &["MAINNET_RPC_URL", "ALCHEMY_MAINNET_RPC_URL"]),
    (Network::Polygon, &["POLYGON_MAINNET_RPC_URL"]),
    (Network::PolygonMumbai, &["POLYGON_MUMBAI_RPC_URL"]),
    (Network::BscTestnet, &["RPC_URL_BINANCE"]),
    (Network::OptimisticGoerli, &["OPTIMISM_GOERLI_RPC_URL"]),
    (Network::ArbitrumGoerli, &["ARBITRUM_GOERLI_RPC_URL"]),
    (Network::PolygonZkEvmTestnet, &["ZK_EVM_POLYGONSCAN_RPC_URL"]),
    (Network::Sepolia, &["SEPOLIA_RPC_URL"]),
];

/// Environment variables holding explorer API keys.
const API_KEY_ENV: &[(Network, &str)] = &[
    (Network::Sepolia, "ETHERSCAN_API_KEY"),
    (Network::Mainnet, "ETHERSCAN_API_KEY"),
    (Network::Polygon, "POLYGONSCAN_API_KEY"),
    (Network::PolygonMumbai, "POLYGONSCAN_API_KEY"),
    (Network::BscTestnet, "BSCSCAN_API_KEY"),
    (Network::OptimisticGoerli, "OPTIMISM_ETHERSCAN_API_KEY"),
    (Network::ArbitrumGoerli, "ARBITRUM_ETHERSCAN_API_KEY"),
    (Network::PolygonZkEvmTestnet, "ZK_EVM_POLYGONSCAN_API_KEY"),
];

/// Alchemy endpoints used when only `ALCHEMY_API_KEY` is provided.
fn alchemy_fallback(network: Network, key: &str) -> Option<String> {
    match network {
        Network::Mainnet => Some(format!("https://eth-mainnet.alchemyapi.io/v2/{key}")),
        Network::Polygon => Some(format!("https://polygon-mainnet.g.alchemy.com/v2/{key}")),
        _ => None,
    }
}

/// Per-network configuration with custom override support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRegistry {
    configs: BTreeMap<Network, NetworkConfig>,
}

impl NetworkRegistry {
    /// Create a registry populated with the built-in defaults.
    pub fn with_defaults() -> Self {
        let configs = Network::ALL
            .into_iter()
            .map(|n| (n, default_network_config(n)))
            .collect();
        Self { configs }
    }

    pub fn get(&self, network: Network) -> Option<&NetworkConfig> {
        self.configs.get(&network)
    }

    pub fn get_mut(&mut self, network: Network) -> &mut NetworkConfig {
        self.configs
            .entry(network)
            .or_insert_with(|| default_network_config(network))
    }

    /// Override the RPC URL for a network with a custom endpoint.
    pub fn set_custom_rpc(&mut self, network: Network, url: String) -> Result<(), ConfigError> {
        if !validate_url(&url) {
            return Err(ConfigError::InvalidUrl { network, url });
        }
        let entry = self.get_mut(network);
        entry.url = Some(url);
        entry.is_custom = true;
        Ok(())
    }

    /// Reset a network's RPC URL back to the built-in default.
    pub fn reset_to_default(&mut self, network: Network) {
        let default_url = default_network_config(network).url;
        let entry = self.get_mut(network);
        entry.url = default_url;
        entry.is_custom = false;
    }

    /// Apply RPC URLs, the deployer private key and explorer API keys from the
    /// environment. `lookup` returns the value of a variable; empty values are
    /// treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for (network, keys) in RPC_ENV {
            let url = keys.iter().find_map(|k| get(*k)).or_else(|| {
                get("ALCHEMY_API_KEY").and_then(|key| alchemy_fallback(*network, &key))
            });
            if let Some(url) = url {
                self.set_custom_rpc(*network, url)?;
            }
        }

        if let Some(key) = get("PRIVATE_KEY") {
            for config in self.configs.values_mut().filter(|c| !c.network.is_dev()) {
                config.accounts = vec![key.clone()];
            }
        }

        for (network, var) in API_KEY_ENV {
            if let Some(key) = get(*var) {
                if let Some(explorer) = self.get_mut(*network).explorer.as_mut() {
                    explorer.api_key = Some(key);
                }
            }
        }

        Ok(())
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

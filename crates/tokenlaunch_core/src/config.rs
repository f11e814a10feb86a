use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::networks::{ExplorerConfig, Network, NetworkConfig, NetworkRegistry};

/// Name of the optional project file, looked up in the project root.
pub const PROJECT_FILE: &str = "tokenlaunch.toml";

/// Environment variable selecting the target network.
pub const NETWORK_ENV: &str = "TOKENLAUNCH_NETWORK";

// ---------------------------------------------------------------------------
// Named accounts
// ---------------------------------------------------------------------------

/// Which account index a role maps to, optionally per chain ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRule {
    pub default: usize,
    pub per_chain: BTreeMap<u64, usize>,
}

impl AccountRule {
    pub fn index_for(&self, chain_id: u64) -> usize {
        self.per_chain.get(&chain_id).copied().unwrap_or(self.default)
    }
}

/// Role-based account aliases. Only `deployer` is used by the deploy script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAccounts {
    pub deployer: AccountRule,
}

impl Default for NamedAccounts {
    fn default() -> Self {
        // First account everywhere, mainnet pinned explicitly.
        Self {
            deployer: AccountRule {
                default: 0,
                per_chain: BTreeMap::from([(1, 0)]),
            },
        }
    }
}

impl NamedAccounts {
    pub fn deployer_index(&self, chain_id: u64) -> usize {
        self.deployer.index_for(chain_id)
    }
}

// ---------------------------------------------------------------------------
// Compiler settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

/// Solidity compiler versions the project builds with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub versions: Vec<String>,
    pub optimizer: OptimizerSettings,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            versions: ["0.8.22", "0.8.19", "0.8.18", "0.8.15", "0.6.6"]
                .into_iter()
                .map(String::from)
                .collect(),
            optimizer: OptimizerSettings {
                enabled: true,
                runs: 1000,
            },
        }
    }
}

impl CompilerSettings {
    /// Whether a solc long version (`0.8.22+commit.4fc1097e`, optionally
    /// prefixed with `v`) matches one of the configured versions.
    pub fn supports(&self, long_version: &str) -> bool {
        let short = long_version
            .trim_start_matches('v')
            .split('+')
            .next()
            .unwrap_or_default();
        self.versions.iter().any(|v| v == short)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub artifacts: PathBuf,
    pub deployments: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.resolve(&self.artifacts)
    }

    pub fn deployments_dir(&self) -> PathBuf {
        self.resolve(&self.deployments)
    }
}

// ---------------------------------------------------------------------------
// Project file schema
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectFile {
    default_network: Option<String>,
    networks: BTreeMap<String, NetworkOverride>,
    named_accounts: Option<NamedAccountsFile>,
    compilers: Option<CompilerSettings>,
    paths: Option<PathsFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkOverride {
    url: Option<String>,
    save_deployments: Option<bool>,
    explorer: Option<ExplorerOverride>,
}

#[derive(Debug, Deserialize)]
struct ExplorerOverride {
    api_url: String,
    browser_url: String,
}

#[derive(Debug, Deserialize)]
struct NamedAccountsFile {
    deployer: AccountRuleFile,
}

// TOML keys are always strings, so chain IDs arrive as text.
#[derive(Debug, Deserialize)]
struct AccountRuleFile {
    #[serde(default)]
    default: usize,
    #[serde(default)]
    per_chain: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PathsFile {
    artifacts: Option<PathBuf>,
    deployments: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// LaunchConfig
// ---------------------------------------------------------------------------

/// Everything the deploy pipeline needs to know about the project and the
/// selected network.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub network: Network,
    pub networks: NetworkRegistry,
    pub named_accounts: NamedAccounts,
    pub compilers: CompilerSettings,
    pub paths: ProjectPaths,
}

impl LaunchConfig {
    /// Configuration with built-in defaults only, targeting `localhost`.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            network: Network::Localhost,
            networks: NetworkRegistry::with_defaults(),
            named_accounts: NamedAccounts::default(),
            compilers: CompilerSettings::default(),
            paths: ProjectPaths::new(root),
        }
    }

    /// Load configuration for the project rooted at `root`, reading the
    /// process environment.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        Self::load_with(root, |key| std::env::var(key).ok())
    }

    /// Load configuration: defaults, then `tokenlaunch.toml` (if present),
    /// then environment variables.
    pub fn load_with<F>(root: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::defaults(root);
        let mut default_network = None;

        let path = root.join(PROJECT_FILE);
        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let file: ProjectFile = toml::from_str(&content).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            default_network = file.default_network.clone();
            config.apply_file(file)?;
            info!("Loaded project config from {}", path.display());
        } else {
            debug!("No {} in {}, using defaults", PROJECT_FILE, root.display());
        }

        config.networks.apply_env(&lookup)?;

        let selected = lookup(NETWORK_ENV)
            .filter(|v| !v.trim().is_empty())
            .or(default_network);
        if let Some(name) = selected {
            config.network = name.trim().parse()?;
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ProjectFile) -> Result<(), ConfigError> {
        for (name, overrides) in file.networks {
            let network: Network = name.parse()?;
            if let Some(url) = overrides.url {
                self.networks.set_custom_rpc(network, url)?;
            }
            let entry = self.networks.get_mut(network);
            if let Some(save) = overrides.save_deployments {
                entry.save_deployments = save;
            }
            if let Some(explorer) = overrides.explorer {
                let api_key = entry.explorer.take().and_then(|e| e.api_key);
                entry.explorer = Some(ExplorerConfig {
                    api_url: explorer.api_url,
                    browser_url: explorer.browser_url,
                    api_key,
                });
            }
        }

        if let Some(accounts) = file.named_accounts {
            let mut per_chain = BTreeMap::new();
            for (chain, index) in accounts.deployer.per_chain {
                let chain_id = chain
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidChainId(chain.clone()))?;
                per_chain.insert(chain_id, index);
            }
            self.named_accounts = NamedAccounts {
                deployer: AccountRule {
                    default: accounts.deployer.default,
                    per_chain,
                },
            };
        }

        if let Some(compilers) = file.compilers {
            self.compilers = compilers;
        }

        if let Some(paths) = file.paths {
            if let Some(artifacts) = paths.artifacts {
                self.paths.artifacts = artifacts;
            }
            if let Some(deployments) = paths.deployments {
                self.paths.deployments = deployments;
            }
        }

        Ok(())
    }

    /// The selected network's configuration, checked for reachability.
    pub fn active_network(&self) -> Result<&NetworkConfig, ConfigError> {
        if self.network == Network::Hardhat {
            return Err(ConfigError::InProcessNetwork(self.network));
        }
        let config = self
            .networks
            .get(self.network)
            .ok_or_else(|| ConfigError::UnknownNetwork(self.network.name().to_string()))?;
        if config.url.is_none() {
            return Err(ConfigError::MissingRpcUrl(self.network));
        }
        Ok(config)
    }

    /// Returns the base state directory: `~/.tokenlaunch/`
    pub fn base_dir() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".tokenlaunch"))
    }

    /// Returns the logs directory: `~/.tokenlaunch/logs/`
    pub fn logs_dir() -> Result<PathBuf, ConfigError> {
        Ok(Self::base_dir()?.join("logs"))
    }
}

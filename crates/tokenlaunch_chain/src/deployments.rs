use std::path::{Path, PathBuf};

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenlaunch_core::Network;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed deployment record {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What was deployed where, persisted per network so later runs can reuse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: Address,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub args: Vec<String>,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub chain_id: u64,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Whether this record was produced from the same creation code and
    /// constructor arguments.
    pub fn matches(&self, bytecode: &Bytes, args: &[String]) -> bool {
        &self.bytecode == bytecode && self.args == args
    }
}

/// Deployment records for one network: `deployments/<network>/<Contract>.json`.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
    chain_id: u64,
}

impl DeploymentStore {
    pub fn new(deployments_root: &Path, network: Network, chain_id: u64) -> Self {
        Self {
            dir: deployments_root.join(network.name()),
            chain_id,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load the record for `name`. Returns `None` if nothing was saved yet.
    pub fn load(&self, name: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        let path = self.record_path(name);
        if !path.exists() {
            debug!(path = %path.display(), "no deployment record");
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let record = serde_json::from_str(&json)
            .map_err(|source| StoreError::Malformed { path, source })?;
        Ok(Some(record))
    }

    /// Persist the record for `name`, creating the network directory and its
    /// `.chainId` marker on first use.
    pub fn save(&self, name: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let marker = self.dir.join(".chainId");
        if !marker.exists() {
            std::fs::write(&marker, self.chain_id.to_string()).map_err(|source| {
                StoreError::Io {
                    path: marker.clone(),
                    source,
                }
            })?;
        }

        let path = self.record_path(name);
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), address = %record.address, "deployment record saved");
        Ok(())
    }

    /// Names of all contracts with a saved record, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|x| x.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

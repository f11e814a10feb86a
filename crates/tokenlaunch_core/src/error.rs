use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::networks::Network;

/// Errors raised while assembling the project configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid chain ID in named accounts: {0}")]
    InvalidChainId(String),

    #[error("Invalid RPC URL for {network}: {url}")]
    InvalidUrl { network: Network, url: String },

    #[error("No RPC URL configured for {0}")]
    MissingRpcUrl(Network),

    #[error("{0} runs in-process and has no RPC endpoint; select localhost instead")]
    InProcessNetwork(Network),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Broad classification of a pipeline failure, used for the final error line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Invalid or missing configuration.
    Config,
    /// RPC or explorer connectivity.
    Network,
    /// Artifact, encoding or on-chain execution problem.
    Contract,
    /// The explorer refused or failed the verification.
    Verification,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "configuration",
            Self::Network => "network",
            Self::Contract => "contract",
            Self::Verification => "verification",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Implemented by every error enum in the workspace so the script can report
/// a category without matching on concrete types.
pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}

impl Categorized for ConfigError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Read { .. } | Self::NoHomeDir => ErrorCategory::Internal,
            _ => ErrorCategory::Config,
        }
    }
}

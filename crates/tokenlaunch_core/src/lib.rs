pub mod config;
pub mod error;
pub mod logging;
pub mod networks;

pub use config::{
    AccountRule, CompilerSettings, LaunchConfig, NamedAccounts, OptimizerSettings, ProjectPaths,
};
pub use error::{Categorized, ConfigError, ErrorCategory};
pub use networks::{ExplorerConfig, Network, NetworkConfig, NetworkRegistry, validate_url};

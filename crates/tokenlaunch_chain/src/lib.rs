pub mod accounts;
pub mod args;
pub mod artifact;
pub mod connection;
pub mod deploy;
pub mod deployments;
pub mod etherscan;
pub mod verify;

pub use accounts::{AccountError, ConfiguredAccounts, NamedAccountResolver};
pub use args::{ConstructorArg, EncodeError, encode_constructor_args};
pub use artifact::{ArtifactError, BuildInfo, ContractArtifact};
pub use connection::{ChainConnection, ConnectError};
pub use deploy::{DeployError, DeployOptions, DeployProvider, Deployment, EvmDeployer};
pub use deployments::{DeploymentRecord, DeploymentStore, StoreError};
pub use etherscan::EtherscanVerifier;
pub use verify::{VerificationProvider, VerificationStatus, VerifyError};

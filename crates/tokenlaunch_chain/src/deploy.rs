use std::path::PathBuf;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokenlaunch_core::{Categorized, ErrorCategory, Network, ProjectPaths};
use tracing::{debug, info};

use crate::args::{ConstructorArg, EncodeError, encode_constructor_args};
use crate::artifact::{ArtifactError, ContractArtifact};
use crate::connection::ChainConnection;
use crate::deployments::{DeploymentRecord, DeploymentStore, StoreError};

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub from: Address,
    pub args: Vec<ConstructorArg>,
    pub wait_confirmations: u64,
    /// Log transaction progress at info level.
    pub log: bool,
}

/// Where a contract ended up and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_name: String,
    pub address: Address,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub args: Vec<ConstructorArg>,
    /// `false` when an identical earlier deployment was reused.
    pub newly_deployed: bool,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Deployment transaction {0} reverted")]
    Reverted(TxHash),

    #[error("Receipt for {0} has no contract address")]
    MissingAddress(TxHash),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Categorized for DeployError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Rpc(_) => ErrorCategory::Network,
            Self::Store(_) => ErrorCategory::Internal,
            Self::Artifact(_) | Self::Encode(_) | Self::Reverted(_) | Self::MissingAddress(_) => {
                ErrorCategory::Contract
            }
        }
    }
}

/// Deploys named contracts from the build artifacts.
#[async_trait]
pub trait DeployProvider: Send + Sync {
    async fn deploy(&self, contract_name: &str, options: DeployOptions)
    -> Result<Deployment, DeployError>;
}

/// Local dev nodes mine on demand, so waiting for more than one block would
/// never finish.
pub fn effective_confirmations(network: Network, requested: u64) -> u64 {
    if network.is_dev() { 1 } else { requested.max(1) }
}

/// Creation bytecode followed by the ABI-encoded constructor arguments.
pub fn deploy_code(bytecode: &Bytes, encoded_args: &Bytes) -> Bytes {
    let mut code = Vec::with_capacity(bytecode.len() + encoded_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(encoded_args);
    code.into()
}

/// Deploys over JSON-RPC and keeps per-network deployment records.
pub struct EvmDeployer {
    connection: ChainConnection,
    artifacts_dir: PathBuf,
    store: Option<DeploymentStore>,
}

impl EvmDeployer {
    pub fn new(connection: ChainConnection, paths: &ProjectPaths) -> Self {
        let network = &connection.network;
        let store = network.save_deployments.then(|| {
            DeploymentStore::new(&paths.deployments_dir(), network.network, network.chain_id)
        });
        Self {
            artifacts_dir: paths.artifacts_dir(),
            connection,
            store,
        }
    }

    /// A saved deployment of the same code and args whose contract still exists.
    async fn reusable(
        &self,
        name: &str,
        bytecode: &Bytes,
        args: &[String],
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(record) = store.load(name)? else {
            return Ok(None);
        };
        if !record.matches(bytecode, args) {
            debug!(name, "saved deployment differs, redeploying");
            return Ok(None);
        }
        let code = self
            .connection
            .provider
            .get_code_at(record.address)
            .await
            .map_err(|e| DeployError::Rpc(e.to_string()))?;
        if code.is_empty() {
            debug!(name, address = %record.address, "saved deployment has no code on chain");
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl DeployProvider for EvmDeployer {
    async fn deploy(
        &self,
        contract_name: &str,
        options: DeployOptions,
    ) -> Result<Deployment, DeployError> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, contract_name)?;
        let bytecode = artifact.bytecode()?;
        let encoded = encode_constructor_args(&artifact.abi, &options.args)?;
        let arg_strings: Vec<String> = options.args.iter().map(ToString::to_string).collect();

        if let Some(record) = self.reusable(contract_name, &bytecode, &arg_strings).await? {
            if options.log {
                info!("reusing \"{contract_name}\" at {}", record.address);
            }
            return Ok(Deployment {
                contract_name: contract_name.to_string(),
                address: record.address,
                transaction_hash: record.transaction_hash,
                block_number: record.block_number,
                gas_used: record.gas_used,
                args: options.args,
                newly_deployed: false,
            });
        }

        let tx = TransactionRequest::default()
            .from(options.from)
            .with_deploy_code(deploy_code(&bytecode, &encoded));
        let pending = self
            .connection
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DeployError::Rpc(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        if options.log {
            info!("deploying \"{contract_name}\" (tx: {tx_hash})...");
        }

        let confirmations =
            effective_confirmations(self.connection.network.network, options.wait_confirmations);
        debug!(%tx_hash, confirmations, "waiting for receipt");
        let receipt = pending
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(|e| DeployError::Rpc(e.to_string()))?;

        if !receipt.status() {
            return Err(DeployError::Reverted(tx_hash));
        }
        let address = receipt
            .contract_address
            .ok_or(DeployError::MissingAddress(tx_hash))?;
        let gas_used = receipt.gas_used;
        if options.log {
            info!("deployed at {address} with {gas_used} gas");
        }

        if let Some(store) = &self.store {
            let record = DeploymentRecord {
                address,
                abi: artifact.abi.clone(),
                bytecode,
                args: arg_strings,
                transaction_hash: Some(tx_hash),
                block_number: receipt.block_number,
                gas_used: Some(gas_used),
                chain_id: self.connection.network.chain_id,
                deployed_at: Utc::now(),
            };
            store.save(contract_name, &record)?;
        }

        Ok(Deployment {
            contract_name: contract_name.to_string(),
            address,
            transaction_hash: Some(tx_hash),
            block_number: receipt.block_number,
            gas_used: Some(gas_used),
            args: options.args,
            newly_deployed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokenlaunch_core::NetworkRegistry;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer};

    use super::*;
    use crate::artifact::test_support::{ERC20_BYTECODE, erc20_abi, write_erc20_artifacts};
    use crate::connection::test_support::{DEPLOY_TX_HASH, RpcResult, ScriptedNode};

    const TOKEN_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn token_args() -> Vec<ConstructorArg> {
        vec!["ERC20Token".into(), "E20T".into(), 18u64.into(), 10u64.into()]
    }

    fn options() -> DeployOptions {
        DeployOptions {
            from: Address::from([0x01; 20]),
            args: token_args(),
            wait_confirmations: 6,
            log: true,
        }
    }

    /// Project rooted at `root` with ERC20Token artifacts, deploying to a
    /// Sepolia-like network served by `rpc_url`.
    fn deployer(root: &std::path::Path, rpc_url: &str) -> EvmDeployer {
        let paths = ProjectPaths::new(root);
        write_erc20_artifacts(&paths.artifacts_dir());

        let mut registry = NetworkRegistry::with_defaults();
        registry.set_custom_rpc(Network::Sepolia, rpc_url.into()).unwrap();
        let connection = ChainConnection::connect(registry.get(Network::Sepolia).unwrap()).unwrap();
        EvmDeployer::new(connection, &paths)
    }

    /// A node serving `receipt` for the creation transaction.
    async fn scripted_node(receipt: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ScriptedNode {
                chain_id: 11155111,
                receipt,
            })
            .mount(&server)
            .await;
        server
    }

    /// Options that only wait for inclusion.
    fn single_confirmation() -> DeployOptions {
        DeployOptions {
            wait_confirmations: 1,
            ..options()
        }
    }

    fn saved_record(root: &std::path::Path, args: Vec<String>) -> DeploymentRecord {
        let record = DeploymentRecord {
            address: Address::from([0xcd; 20]),
            abi: serde_json::from_value(erc20_abi()).unwrap(),
            bytecode: ERC20_BYTECODE.parse().unwrap(),
            args,
            transaction_hash: Some(TxHash::from([0x02; 32])),
            block_number: Some(7),
            gas_used: Some(900_000),
            chain_id: 11155111,
            deployed_at: Utc::now(),
        };
        let paths = ProjectPaths::new(root);
        DeploymentStore::new(&paths.deployments_dir(), Network::Sepolia, 11155111)
            .save("ERC20Token", &record)
            .unwrap();
        record
    }

    #[test]
    fn confirmations_clamped_on_dev_networks() {
        assert_eq!(effective_confirmations(Network::Localhost, 6), 1);
        assert_eq!(effective_confirmations(Network::Hardhat, 6), 1);
        assert_eq!(effective_confirmations(Network::Sepolia, 6), 6);
        assert_eq!(effective_confirmations(Network::Mainnet, 0), 1);
    }

    #[test]
    fn deploy_code_appends_args() {
        let code = deploy_code(&Bytes::from_static(&[0x60, 0x80]), &Bytes::from_static(&[0xff]));
        assert_eq!(code.as_ref(), &[0x60, 0x80, 0xff]);
    }

    #[test]
    fn categories() {
        assert_eq!(DeployError::Rpc("timeout".into()).category(), ErrorCategory::Network);
        assert_eq!(
            DeployError::Reverted(TxHash::ZERO).category(),
            ErrorCategory::Contract
        );
    }

    #[test]
    fn dev_networks_do_not_keep_records() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::with_defaults();
        let connection =
            ChainConnection::connect(registry.get(Network::Localhost).unwrap()).unwrap();
        let deployer = EvmDeployer::new(connection, &ProjectPaths::new(tmp.path()));
        assert!(deployer.store.is_none());
    }

    #[tokio::test]
    async fn missing_artifact_fails_before_any_rpc() {
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), "http://127.0.0.1:1");
        let err = deployer.deploy("Missing", options()).await.unwrap_err();
        assert!(matches!(err, DeployError::Artifact(ArtifactError::NotFound { .. })));
    }

    #[tokio::test]
    async fn wrong_arity_fails_before_any_rpc() {
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), "http://127.0.0.1:1");
        let mut opts = options();
        opts.args.truncate(2);
        let err = deployer.deploy("ERC20Token", opts).await.unwrap_err();
        assert!(matches!(err, DeployError::Encode(EncodeError::Arity { .. })));
    }

    #[tokio::test]
    async fn unreachable_node_is_rpc_error() {
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), "http://127.0.0.1:1");
        let err = deployer.deploy("ERC20Token", options()).await.unwrap_err();
        assert!(matches!(err, DeployError::Rpc(_)));
    }

    #[tokio::test]
    async fn matching_record_with_live_code_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "method": "eth_getCode" })))
            .respond_with(RpcResult(serde_json::json!("0x6080604052")))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), &server.uri());
        let saved = saved_record(tmp.path(), vec![
            "ERC20Token".into(),
            "E20T".into(),
            "18".into(),
            "10".into(),
        ]);

        let deployment = deployer.deploy("ERC20Token", options()).await.unwrap();
        assert!(!deployment.newly_deployed);
        assert_eq!(deployment.address, saved.address);
        assert_eq!(deployment.block_number, Some(7));
        assert_eq!(deployment.args, token_args());
    }

    #[tokio::test]
    async fn record_with_other_args_is_not_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), "http://127.0.0.1:1");
        saved_record(tmp.path(), vec!["Other".into(), "OTH".into(), "18".into(), "10".into()]);

        let bytecode: Bytes = ERC20_BYTECODE.parse().unwrap();
        let args: Vec<String> = token_args().iter().map(ToString::to_string).collect();
        assert!(deployer.reusable("ERC20Token", &bytecode, &args).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_deploy_is_recorded() {
        let server = scripted_node(ScriptedNode::receipt(true, Some(TOKEN_ADDRESS))).await;
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), &server.uri());

        let deployment = deployer
            .deploy("ERC20Token", single_confirmation())
            .await
            .unwrap();
        let address: Address = TOKEN_ADDRESS.parse().unwrap();
        assert!(deployment.newly_deployed);
        assert_eq!(deployment.address, address);
        assert_eq!(deployment.transaction_hash, Some(DEPLOY_TX_HASH.parse().unwrap()));
        assert_eq!(deployment.block_number, Some(16));
        assert_eq!(deployment.gas_used, Some(900_000));

        let network_dir = ProjectPaths::new(tmp.path()).deployments_dir().join("sepolia");
        let marker = std::fs::read_to_string(network_dir.join(".chainId")).unwrap();
        assert_eq!(marker, "11155111");
        assert!(network_dir.join("ERC20Token.json").is_file());

        let store = DeploymentStore::new(
            &ProjectPaths::new(tmp.path()).deployments_dir(),
            Network::Sepolia,
            11155111,
        );
        let record = store.load("ERC20Token").unwrap().unwrap();
        assert_eq!(record.address, address);
        assert_eq!(record.args, vec!["ERC20Token", "E20T", "18", "10"]);
        assert_eq!(record.chain_id, 11155111);
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let server = scripted_node(ScriptedNode::receipt(false, Some(TOKEN_ADDRESS))).await;
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), &server.uri());

        let err = deployer
            .deploy("ERC20Token", single_confirmation())
            .await
            .unwrap_err();
        let tx_hash: TxHash = DEPLOY_TX_HASH.parse().unwrap();
        assert!(matches!(err, DeployError::Reverted(hash) if hash == tx_hash));
        assert!(!ProjectPaths::new(tmp.path()).deployments_dir().exists());
    }

    #[tokio::test]
    async fn receipt_without_contract_address_is_an_error() {
        let server = scripted_node(ScriptedNode::receipt(true, None)).await;
        let tmp = tempfile::tempdir().unwrap();
        let deployer = deployer(tmp.path(), &server.uri());

        let err = deployer
            .deploy("ERC20Token", single_confirmation())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingAddress(_)));
        assert_eq!(err.category(), ErrorCategory::Contract);
    }
}

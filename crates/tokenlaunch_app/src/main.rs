use anyhow::{Context, Result};
use tracing::info;

use tokenlaunch_app::{TOKEN_NAME, report_failure, run};
use tokenlaunch_chain::{ChainConnection, ConfiguredAccounts, EtherscanVerifier, EvmDeployer};
use tokenlaunch_core::{LaunchConfig, logging};

/// Collaborators wired from the project configuration.
struct Pipeline {
    accounts: ConfiguredAccounts,
    deployer: EvmDeployer,
    verifier: EtherscanVerifier,
}

async fn setup() -> Result<Pipeline> {
    let root = std::env::current_dir().context("Failed to read the working directory")?;
    let config = LaunchConfig::load(&root)?;
    let network = config.active_network()?;
    info!(network = %network.network, chain_id = network.chain_id, "loaded configuration");

    let connection = ChainConnection::connect(network)?;
    connection.check_chain_id().await?;

    let verifier = EtherscanVerifier::new(
        network,
        config.paths.artifacts_dir(),
        TOKEN_NAME,
        config.compilers.clone(),
    );
    let deployer = EvmDeployer::new(connection.clone(), &config.paths);
    let accounts = ConfiguredAccounts::new(connection, config.named_accounts.clone());

    Ok(Pipeline {
        accounts,
        deployer,
        verifier,
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("File logging unavailable: {e:#}");
            logging::init_console_logging().ok();
            None
        }
    };

    let code = match setup().await {
        Ok(pipeline) => run(&pipeline.accounts, &pipeline.deployer, &pipeline.verifier).await,
        Err(err) => {
            report_failure(&err);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}

//! The ERC20Token deploy script.
//!
//! Resolve the deployer, deploy the token with its fixed constructor
//! arguments, then publish the source on the network's explorer. The
//! collaborators are traits so the flow runs the same against a live chain
//! or test doubles.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tokenlaunch_chain::{
    AccountError, ConnectError, ConstructorArg, DeployError, DeployOptions, DeployProvider,
    Deployment, NamedAccountResolver, VerificationProvider, VerificationStatus, VerifyError,
};
use tokenlaunch_core::{Categorized, ConfigError, ErrorCategory};
use tracing::{error, info};

pub const TOKEN_NAME: &str = "ERC20Token";
pub const TOKEN_SYMBOL: &str = "E20T";
pub const DECIMALS: u64 = 18;
pub const INITIAL_SUPPLY: u64 = 10;
pub const WAIT_CONFIRMATIONS: u64 = 6;

/// Constructor arguments, in declaration order.
pub fn token_args() -> Vec<ConstructorArg> {
    vec![
        TOKEN_NAME.into(),
        TOKEN_SYMBOL.into(),
        DECIMALS.into(),
        INITIAL_SUPPLY.into(),
    ]
}

/// Request source verification. A contract the explorer already knows counts
/// as success.
pub async fn verify(
    provider: &dyn VerificationProvider,
    address: Address,
    args: &[ConstructorArg],
) -> Result<(), VerifyError> {
    info!("Verifying contract...");
    match provider.verify(address, args).await? {
        VerificationStatus::Verified => {}
        VerificationStatus::AlreadyVerified => info!("Already verified!"),
    }
    Ok(())
}

pub async fn deploy_function(
    accounts: &dyn NamedAccountResolver,
    deployer: &dyn DeployProvider,
    verifier: &dyn VerificationProvider,
) -> Result<Deployment> {
    let from = accounts
        .deployer()
        .await
        .context("Failed to resolve the deployer account")?;
    let args = token_args();

    let deployment = deployer
        .deploy(
            TOKEN_NAME,
            DeployOptions {
                from,
                args: args.clone(),
                wait_confirmations: WAIT_CONFIRMATIONS,
                log: true,
            },
        )
        .await
        .with_context(|| format!("Failed to deploy {TOKEN_NAME}"))?;
    info!("{TOKEN_NAME} deployed at: {}", deployment.address);

    verify(verifier, deployment.address, &args)
        .await
        .with_context(|| format!("Failed to verify {TOKEN_NAME} at {}", deployment.address))?;

    Ok(deployment)
}

/// Classify an error from any layer of the pipeline.
pub fn error_category(err: &anyhow::Error) -> ErrorCategory {
    if let Some(e) = err.downcast_ref::<DeployError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<VerifyError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<AccountError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<ConnectError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<ConfigError>() {
        e.category()
    } else {
        ErrorCategory::Internal
    }
}

/// Log a failure with its category.
pub fn report_failure(err: &anyhow::Error) {
    error!(category = %error_category(err), "{err:#}");
}

/// Run the script and return the process exit code.
pub async fn run(
    accounts: &dyn NamedAccountResolver,
    deployer: &dyn DeployProvider,
    verifier: &dyn VerificationProvider,
) -> i32 {
    match deploy_function(accounts, deployer, verifier).await {
        Ok(_) => 0,
        Err(err) => {
            report_failure(&err);
            1
        }
    }
}

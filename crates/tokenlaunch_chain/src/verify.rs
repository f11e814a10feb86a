use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokenlaunch_core::{Categorized, ErrorCategory, Network};

use crate::args::{ConstructorArg, EncodeError};
use crate::artifact::ArtifactError;

/// Successful outcomes of a verification request.
///
/// A contract whose source the explorer already knows is not an error; the
/// provider reports it here so callers never inspect message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("No block explorer configured for {0}")]
    ExplorerNotConfigured(Network),

    #[error("No explorer API key configured for {0}")]
    MissingApiKey(Network),

    #[error("Explorer request failed: {0}")]
    Request(String),

    #[error("Explorer rejected the submission: {0}")]
    Rejected(String),

    #[error("Verification failed: {0}")]
    Failed(String),

    #[error("Verification still pending after {attempts} status checks (guid {guid})")]
    Timeout { guid: String, attempts: u32 },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl Categorized for VerifyError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::ExplorerNotConfigured(_) | Self::MissingApiKey(_) => ErrorCategory::Config,
            Self::Request(_) => ErrorCategory::Network,
            Self::Rejected(_) | Self::Failed(_) | Self::Timeout { .. } => {
                ErrorCategory::Verification
            }
            Self::Artifact(_) | Self::Encode(_) => ErrorCategory::Contract,
        }
    }
}

/// Publishes a deployed contract's source to a block explorer.
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    /// Verify the contract at `address`, deployed with `args`.
    async fn verify(
        &self,
        address: Address,
        args: &[ConstructorArg],
    ) -> Result<VerificationStatus, VerifyError>;
}

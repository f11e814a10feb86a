//! Etherscan-compatible source verification.
//!
//! Every explorer in the network table (Etherscan, Polygonscan, BscScan and
//! the rollup explorers) speaks the same `module=contract` API: submit the
//! standard-JSON compiler input, get a GUID back, then poll until the
//! explorer reports a verdict.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::{Address, hex};
use async_trait::async_trait;
use serde::Deserialize;
use tokenlaunch_core::{CompilerSettings, ExplorerConfig, Network, NetworkConfig};
use tracing::{debug, info, warn};

use crate::args::{ConstructorArg, encode_constructor_args};
use crate::artifact::ContractArtifact;
use crate::verify::{VerificationProvider, VerificationStatus, VerifyError};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLLS: u32 = 40;
/// Explorers need a few blocks to index fresh bytecode before they accept a submission.
const DEFAULT_MAX_SUBMIT_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceCodeResult {
    Entries(Vec<SourceCodeEntry>),
    Message(String),
}

#[derive(Debug, Deserialize)]
struct SourceCodeEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
}

/// What an explorer reply means, independent of which endpoint produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Pending,
    Verified,
    AlreadyVerified,
    NotIndexed,
    Failed,
    Other,
}

fn classify(message: &str) -> Reply {
    let lower = message.to_ascii_lowercase();
    if lower.contains("already verified") {
        Reply::AlreadyVerified
    } else if lower.contains("pending in queue") {
        Reply::Pending
    } else if lower.starts_with("pass") {
        Reply::Verified
    } else if lower.contains("unable to locate contractcode")
        || lower.contains("does not have bytecode")
    {
        Reply::NotIndexed
    } else if lower.starts_with("fail") {
        Reply::Failed
    } else {
        Reply::Other
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Explorer endpoint and credentials, resolved when verification starts.
struct Endpoint<'a> {
    api_url: &'a str,
    browser_url: &'a str,
    api_key: &'a str,
}

/// Verifies one named contract against a network's explorer.
pub struct EtherscanVerifier {
    client: reqwest::Client,
    network: Network,
    explorer: Option<ExplorerConfig>,
    artifacts_dir: PathBuf,
    contract_name: String,
    compilers: CompilerSettings,
    poll_interval: Duration,
    max_polls: u32,
    max_submit_attempts: u32,
}

impl EtherscanVerifier {
    pub fn new(
        network: &NetworkConfig,
        artifacts_dir: impl Into<PathBuf>,
        contract_name: impl Into<String>,
        compilers: CompilerSettings,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            network: network.network,
            explorer: network.explorer.clone(),
            artifacts_dir: artifacts_dir.into(),
            contract_name: contract_name.into(),
            compilers,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            max_submit_attempts: DEFAULT_MAX_SUBMIT_ATTEMPTS,
        }
    }

    /// Verification needs both an explorer and an API key for it.
    fn endpoint(&self) -> Result<Endpoint<'_>, VerifyError> {
        let explorer = self
            .explorer
            .as_ref()
            .ok_or(VerifyError::ExplorerNotConfigured(self.network))?;
        let api_key = explorer
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(VerifyError::MissingApiKey(self.network))?;
        Ok(Endpoint {
            api_url: &explorer.api_url,
            browser_url: &explorer.browser_url,
            api_key,
        })
    }

    /// Override the delay between status checks and submission retries.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn with_max_submit_attempts(mut self, attempts: u32) -> Self {
        self.max_submit_attempts = attempts.max(1);
        self
    }

    fn contract_url(endpoint: &Endpoint<'_>, address: Address) -> String {
        format!("{}/address/{address}#code", endpoint.browser_url.trim_end_matches('/'))
    }

    /// Ask the explorer whether source is already published for `address`.
    async fn is_verified(&self, endpoint: &Endpoint<'_>, address: Address) -> Result<bool, VerifyError> {
        let address = address.to_string();
        let response: ApiResponse<SourceCodeResult> = self
            .client
            .get(endpoint.api_url)
            .query(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
                ("apikey", endpoint.api_key),
            ])
            .send()
            .await
            .map_err(|e| VerifyError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| VerifyError::Request(e.to_string()))?;

        match response.result {
            SourceCodeResult::Entries(entries) => {
                Ok(entries.iter().any(|e| !e.source_code.trim().is_empty()))
            }
            SourceCodeResult::Message(msg) if response.status == "0" => {
                Err(VerifyError::Rejected(msg))
            }
            SourceCodeResult::Message(_) => Ok(false),
        }
    }

    /// Submit the source. `Ok(None)` means the explorer already has it.
    async fn submit(
        &self,
        endpoint: &Endpoint<'_>,
        address: Address,
        artifact: &ContractArtifact,
        encoded_args: &str,
    ) -> Result<Option<String>, VerifyError> {
        let build_info = artifact.build_info()?;
        if !self.compilers.supports(&build_info.solc_long_version) {
            warn!(
                version = %build_info.solc_long_version,
                "compiler version is not in the configured list"
            );
        }
        let source = serde_json::to_string(&build_info.input)
            .map_err(|e| VerifyError::Request(e.to_string()))?;
        let address = address.to_string();
        let contract_name = artifact.fully_qualified_name();
        let compiler_version = format!("v{}", build_info.solc_long_version);

        let form = [
            ("apikey", endpoint.api_key),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", contract_name.as_str()),
            ("compilerversion", compiler_version.as_str()),
            ("constructorArguements", encoded_args),
        ];

        for attempt in 1..=self.max_submit_attempts {
            let response: ApiResponse<String> = self
                .client
                .post(endpoint.api_url)
                .form(&form)
                .send()
                .await
                .map_err(|e| VerifyError::Request(e.to_string()))?
                .json()
                .await
                .map_err(|e| VerifyError::Request(e.to_string()))?;

            if response.status == "1" {
                debug!(guid = %response.result, "verification submitted");
                return Ok(Some(response.result));
            }

            match classify(&response.result) {
                Reply::AlreadyVerified => return Ok(None),
                Reply::NotIndexed => {
                    if attempt < self.max_submit_attempts {
                        debug!(attempt, "bytecode not indexed yet, retrying submission");
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                _ => {
                    let reason = if response.result.is_empty() {
                        response.message
                    } else {
                        response.result
                    };
                    return Err(VerifyError::Rejected(reason));
                }
            }
        }

        Err(VerifyError::Rejected(format!(
            "{address} has no indexed bytecode after {} attempts",
            self.max_submit_attempts
        )))
    }

    /// Poll the submission until the explorer reaches a verdict.
    async fn wait_for_verdict(
        &self,
        endpoint: &Endpoint<'_>,
        guid: &str,
    ) -> Result<VerificationStatus, VerifyError> {
        for _ in 0..self.max_polls {
            let response: ApiResponse<String> = self
                .client
                .get(endpoint.api_url)
                .query(&[
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                    ("apikey", endpoint.api_key),
                ])
                .send()
                .await
                .map_err(|e| VerifyError::Request(e.to_string()))?
                .json()
                .await
                .map_err(|e| VerifyError::Request(e.to_string()))?;

            match classify(&response.result) {
                Reply::Pending => tokio::time::sleep(self.poll_interval).await,
                Reply::Verified => return Ok(VerificationStatus::Verified),
                Reply::AlreadyVerified => return Ok(VerificationStatus::AlreadyVerified),
                _ => return Err(VerifyError::Failed(response.result)),
            }
        }

        Err(VerifyError::Timeout {
            guid: guid.to_string(),
            attempts: self.max_polls,
        })
    }
}

#[async_trait]
impl VerificationProvider for EtherscanVerifier {
    async fn verify(
        &self,
        address: Address,
        args: &[ConstructorArg],
    ) -> Result<VerificationStatus, VerifyError> {
        let endpoint = self.endpoint()?;
        if self.is_verified(&endpoint, address).await? {
            return Ok(VerificationStatus::AlreadyVerified);
        }

        let artifact = ContractArtifact::load(&self.artifacts_dir, &self.contract_name)?;
        let encoded = hex::encode(encode_constructor_args(&artifact.abi, args)?);

        info!(
            network = self.network.name(),
            contract = %artifact.fully_qualified_name(),
            %address,
            "submitting source for verification"
        );
        let Some(guid) = self.submit(&endpoint, address, &artifact, &encoded).await? else {
            return Ok(VerificationStatus::AlreadyVerified);
        };

        let status = self.wait_for_verdict(&endpoint, &guid).await?;
        if status == VerificationStatus::Verified {
            info!(url = %Self::contract_url(&endpoint, address), "source verified");
        }
        Ok(status)
    }
}

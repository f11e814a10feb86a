use std::path::{Path, PathBuf};

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Bytes, hex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while locating or reading compiled contract artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No artifact named {name} under {}", dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("Artifact name {name} is ambiguous, use a fully qualified name: {}", candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} has no bytecode (abstract contract or interface?)")]
    EmptyBytecode(String),

    #[error("{0} has unlinked library references")]
    Unlinked(String),

    #[error("{name} bytecode is not valid hex: {source}")]
    InvalidBytecode {
        name: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// A compiled contract as written by the Solidity build:
/// `artifacts/<sourceName>/<contractName>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Compiler input and version recorded for a build, used for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect every `<name>.json` artifact (excluding `.dbg.json`) below `dir`.
fn find_artifacts(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            find_artifacts(&path, file_name, found)?;
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            found.push(path);
        }
    }
    Ok(())
}

impl ContractArtifact {
    /// Load an artifact by contract name (`ERC20Token`) or fully qualified
    /// name (`contracts/ERC20Token.sol:ERC20Token`).
    pub fn load(artifacts_dir: &Path, name: &str) -> Result<Self, ArtifactError> {
        let path = match name.split_once(':') {
            Some((source, contract)) => {
                let path = artifacts_dir.join(source).join(format!("{contract}.json"));
                if !path.exists() {
                    return Err(ArtifactError::NotFound {
                        name: name.to_string(),
                        dir: artifacts_dir.to_path_buf(),
                    });
                }
                path
            }
            None => Self::locate(artifacts_dir, name)?,
        };

        let mut artifact: Self = read_json(&path)?;
        artifact.path = path;
        Ok(artifact)
    }

    fn locate(artifacts_dir: &Path, name: &str) -> Result<PathBuf, ArtifactError> {
        let search_root = artifacts_dir.join("contracts");
        let not_found = || ArtifactError::NotFound {
            name: name.to_string(),
            dir: artifacts_dir.to_path_buf(),
        };
        if !search_root.is_dir() {
            return Err(not_found());
        }

        let mut found = Vec::new();
        find_artifacts(&search_root, &format!("{name}.json"), &mut found)?;
        match found.len() {
            0 => Err(not_found()),
            1 => Ok(found.remove(0)),
            _ => {
                let mut candidates: Vec<String> = found
                    .iter()
                    .filter_map(|p| p.strip_prefix(artifacts_dir).ok())
                    .filter_map(|p| p.parent())
                    .map(|source| format!("{}:{name}", source.display()))
                    .collect();
                candidates.sort();
                Err(ArtifactError::Ambiguous {
                    name: name.to_string(),
                    candidates,
                })
            }
        }
    }

    /// `contracts/ERC20Token.sol:ERC20Token`, the form explorers expect.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Decoded creation bytecode.
    pub fn bytecode(&self) -> Result<Bytes, ArtifactError> {
        let raw = self.bytecode.trim();
        if raw.contains("__$") {
            return Err(ArtifactError::Unlinked(self.contract_name.clone()));
        }
        let decoded = hex::decode(raw).map_err(|source| ArtifactError::InvalidBytecode {
            name: self.contract_name.clone(),
            source,
        })?;
        if decoded.is_empty() {
            return Err(ArtifactError::EmptyBytecode(self.contract_name.clone()));
        }
        Ok(Bytes::from(decoded))
    }

    /// Build info referenced by the sibling `<name>.dbg.json` file.
    pub fn build_info(&self) -> Result<BuildInfo, ArtifactError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let dbg_path = dir.join(format!("{}.dbg.json", self.contract_name));
        let dbg: DebugFile = read_json(&dbg_path)?;
        read_json(&dir.join(dbg.build_info))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn load_by_contract_name() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());

        let artifact = ContractArtifact::load(tmp.path(), "ERC20Token").unwrap();
        assert_eq!(artifact.contract_name, "ERC20Token");
        assert_eq!(
            artifact.fully_qualified_name(),
            "contracts/ERC20Token.sol:ERC20Token"
        );
        assert!(artifact.abi.constructor.is_some());
        assert_eq!(artifact.bytecode().unwrap().len(), 18);
    }

    #[test]
    fn load_by_fully_qualified_name() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());

        let artifact =
            ContractArtifact::load(tmp.path(), "contracts/ERC20Token.sol:ERC20Token").unwrap();
        assert_eq!(artifact.source_name, "contracts/ERC20Token.sol");
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());

        let err = ContractArtifact::load(tmp.path(), "Missing").unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }));

        let empty = tempfile::tempdir().unwrap();
        let err = ContractArtifact::load(empty.path(), "ERC20Token").unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());
        let other = tmp.path().join("contracts").join("mocks").join("ERC20Token.sol");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::copy(
            tmp.path().join("contracts/ERC20Token.sol/ERC20Token.json"),
            other.join("ERC20Token.json"),
        )
        .unwrap();

        match ContractArtifact::load(tmp.path(), "ERC20Token").unwrap_err() {
            ArtifactError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other}"),
        }
    }

    #[test]
    fn build_info_is_resolved_through_dbg_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());

        let artifact = ContractArtifact::load(tmp.path(), "ERC20Token").unwrap();
        let info = artifact.build_info().unwrap();
        assert_eq!(info.solc_long_version, "0.8.22+commit.4fc1097e");
        assert_eq!(info.input["language"], "Solidity");
    }

    #[test]
    fn bytecode_rejects_empty_and_unlinked() {
        let tmp = tempfile::tempdir().unwrap();
        write_erc20_artifacts(tmp.path());
        let mut artifact = ContractArtifact::load(tmp.path(), "ERC20Token").unwrap();

        artifact.bytecode = "0x".into();
        assert!(matches!(artifact.bytecode(), Err(ArtifactError::EmptyBytecode(_))));

        artifact.bytecode = "0x6080__$a1b2c3$__6080".into();
        assert!(matches!(artifact.bytecode(), Err(ArtifactError::Unlinked(_))));

        artifact.bytecode = "0xzz".into();
        assert!(matches!(
            artifact.bytecode(),
            Err(ArtifactError::InvalidBytecode { .. })
        ));
    }

    #[test]
    fn malformed_artifact_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("contracts").join("Broken.sol");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Broken.json"), "{ not json").unwrap();

        let err = ContractArtifact::load(tmp.path(), "Broken").unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
        assert!(err.to_string().contains("Broken.json"));
    }
}

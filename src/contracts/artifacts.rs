use crate::chain::{ChainControl, Signer};
use crate::error::{ArtifactError, HarnessError};
use crate::utils::hex::clean_hex;
use alloy::primitives::{Address, Bytes};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The subset of a Hardhat `hh-sol-artifact-1` file the harness needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    #[serde(default)]
    source_name: String,
    bytecode: String,
    #[serde(default)]
    link_references: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
struct ArtifactEntry {
    bytecode: String,
    unlinked: bool,
    origin: PathBuf,
}

/// Compiled contracts indexed by contract name (and `source:Name`).
#[derive(Debug, Default, Clone)]
pub struct ArtifactStore {
    entries: HashMap<String, ArtifactEntry>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `dir` recursively and index every Hardhat artifact in it. Debug
    /// sidecars (`*.dbg.json`) and `build-info/` are skipped, as is any JSON
    /// without a `contractName`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let mut store = Self::new();
        let mut pending = vec![dir.as_ref().to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    if path.file_name().and_then(|n| n.to_str()) != Some("build-info") {
                        pending.push(path);
                    }
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !name.ends_with(".json") || name.ends_with(".dbg.json") {
                    continue;
                }
                store.load_file(&path)?;
            }
        }
        tracing::debug!(
            "[ARTIFACTS] Indexed {} entries from {}",
            store.entries.len(),
            dir.as_ref().display()
        );
        Ok(store)
    }

    fn load_file(&mut self, path: &Path) -> Result<(), ArtifactError> {
        let raw = fs::read_to_string(path)?;
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(_) => return Ok(()),
        };
        if value.get("contractName").is_none() {
            return Ok(());
        }
        let artifact: HardhatArtifact =
            serde_json::from_value(value).map_err(|err| ArtifactError::Malformed {
                name: path.display().to_string(),
                reason: err.to_string(),
            })?;

        let unlinked = !artifact.link_references.is_empty() || artifact.bytecode.contains("__$");
        let entry = ArtifactEntry {
            bytecode: artifact.bytecode,
            unlinked,
            origin: path.to_path_buf(),
        };
        if !artifact.source_name.is_empty() {
            self.entries.insert(
                format!("{}:{}", artifact.source_name, artifact.contract_name),
                entry.clone(),
            );
        }
        if let Some(previous) = self.entries.get(&artifact.contract_name) {
            tracing::warn!(
                "[ARTIFACTS] `{}` defined in both {} and {}; use the fully qualified name",
                artifact.contract_name,
                previous.origin.display(),
                path.display()
            );
            return Ok(());
        }
        self.entries.insert(artifact.contract_name, entry);
        Ok(())
    }

    /// Register creation bytecode directly, bypassing the filesystem.
    pub fn insert(&mut self, name: impl Into<String>, bytecode: &Bytes) {
        self.entries.insert(
            name.into(),
            ArtifactEntry {
                bytecode: format!("{bytecode}"),
                unlinked: false,
                origin: PathBuf::from("<memory>"),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn factory(&self, name: &str) -> Result<ContractFactory, ArtifactError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))?;
        if entry.unlinked {
            return Err(ArtifactError::UnlinkedLibrary(name.to_string()));
        }
        let bytes = hex::decode(clean_hex(&entry.bytecode)).map_err(|err| {
            ArtifactError::Malformed {
                name: name.to_string(),
                reason: format!("bytecode is not hex: {err}"),
            }
        })?;
        if bytes.is_empty() {
            return Err(ArtifactError::Malformed {
                name: name.to_string(),
                reason: "empty creation bytecode (abstract contract or interface?)".to_string(),
            });
        }
        Ok(ContractFactory {
            name: name.to_string(),
            bytecode: Bytes::from(bytes),
        })
    }
}

/// Creation bytecode for one contract.
#[derive(Debug, Clone)]
pub struct ContractFactory {
    name: String,
    bytecode: Bytes,
}

impl ContractFactory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init_code(&self, ctor_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + ctor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(ctor_args);
        Bytes::from(code)
    }

    /// Deploy with ABI-encoded constructor arguments appended to the bytecode.
    pub async fn deploy<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        signer: &Signer,
        ctor_args: &[u8],
    ) -> Result<Address, HarnessError> {
        let address = chain.deploy(signer, self.init_code(ctor_args)).await?;
        tracing::info!("[DEPLOY] {} deployed at {} by {}", self.name, address, signer);
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::ArtifactStore;
    use crate::error::ArtifactError;
    use alloy::primitives::Bytes;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "penguin_harness_artifacts_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("contracts/Vault.sol")).expect("mkdir");
        fs::create_dir_all(dir.join("build-info")).expect("mkdir");
        dir
    }

    #[test]
    fn test_load_dir_indexes_nested_artifacts_and_skips_sidecars() {
        let dir = scratch_dir("index");
        fs::write(
            dir.join("contracts/Vault.sol/Vault.json"),
            r#"{"_format":"hh-sol-artifact-1","contractName":"Vault","sourceName":"contracts/Vault.sol","abi":[],"bytecode":"0x6000","deployedBytecode":"0x","linkReferences":{},"deployedLinkReferences":{}}"#,
        )
        .expect("write");
        fs::write(
            dir.join("contracts/Vault.sol/Vault.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../build-info/x.json"}"#,
        )
        .expect("write");
        fs::write(dir.join("build-info/x.json"), r#"{"id":"x"}"#).expect("write");

        let store = ArtifactStore::load_dir(&dir).expect("load");
        assert!(store.contains("Vault"));
        assert!(store.contains("contracts/Vault.sol:Vault"));
        assert_eq!(store.len(), 2);

        let factory = store.factory("Vault").expect("factory");
        assert_eq!(
            factory.init_code(&[0xaa]),
            Bytes::from(vec![0x60, 0x00, 0xaa])
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unlinked_and_empty_bytecode_are_rejected() {
        let dir = scratch_dir("reject");
        fs::write(
            dir.join("contracts/Vault.sol/Linked.json"),
            r#"{"contractName":"Linked","bytecode":"0x73__$abc$__","linkReferences":{"contracts/Lib.sol":{"Lib":[{"length":20,"start":1}]}}}"#,
        )
        .expect("write");
        fs::write(
            dir.join("contracts/Vault.sol/IVault.json"),
            r#"{"contractName":"IVault","bytecode":"0x"}"#,
        )
        .expect("write");

        let store = ArtifactStore::load_dir(&dir).expect("load");
        assert!(matches!(
            store.factory("Linked"),
            Err(ArtifactError::UnlinkedLibrary(_))
        ));
        assert!(matches!(
            store.factory("IVault"),
            Err(ArtifactError::Malformed { .. })
        ));
        assert!(matches!(
            store.factory("Missing"),
            Err(ArtifactError::NotFound(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let err = ArtifactStore::load_dir("/definitely/not/here").expect_err("no dir");
        assert!(matches!(err, ArtifactError::Io(_)));
    }
}

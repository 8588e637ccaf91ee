use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{abi::Abi, contract::ContractFactory, providers::Middleware, types::Bytes, utils::hex};
use serde::{de::DeserializeOwned, Deserialize};

use crate::config::SolidityConfig;

pub const SWAPII_FACTORY: &str = "contracts/SwapiiFactory.sol:SwapiiFactory";
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
pub const NVM_ARTIFACTS_DIR: &str = "artifacts-nvm";

/// NVM networks deploy the output of the nahmii compiler, kept apart from the
/// plain solc build.
pub fn default_artifacts_dir(nvm: bool) -> &'static str {
    if nvm {
        NVM_ARTIFACTS_DIR
    } else {
        DEFAULT_ARTIFACTS_DIR
    }
}

/// `<source path>:<contract name>`, e.g. `contracts/SwapiiFactory.sol:SwapiiFactory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullyQualifiedName {
    pub source_name: String,
    pub contract_name: String,
}

impl FullyQualifiedName {
    pub fn new(source_name: &str, contract_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            contract_name: contract_name.to_string(),
        }
    }

    pub fn swapii_factory() -> Self {
        Self::new("contracts/SwapiiFactory.sol", "SwapiiFactory")
    }
}

impl FromStr for FullyQualifiedName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (source_name, contract_name) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("`{}` is not a fully qualified contract name", s))?;
        if source_name.is_empty() || contract_name.is_empty() {
            bail!("`{}` is not a fully qualified contract name", s);
        }
        Ok(Self::new(source_name, contract_name))
    }
}

impl fmt::Display for FullyQualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_name, self.contract_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: String,
    /// source name -> library name -> placeholder offsets
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_version: String,
    input: BuildInput,
}

#[derive(Debug, Deserialize)]
struct BuildInput {
    settings: BuildSettings,
}

#[derive(Debug, Default, Deserialize)]
struct BuildSettings {
    #[serde(default)]
    optimizer: BuildOptimizer,
}

#[derive(Debug, Default, Deserialize)]
struct BuildOptimizer {
    #[serde(default)]
    enabled: bool,
    runs: Option<u64>,
}

impl Artifact {
    /// Creation bytecode, rejecting abstract contracts and unlinked libraries.
    pub fn creation_code(&self) -> Result<Bytes> {
        let fqn = format!("{}:{}", self.source_name, self.contract_name);

        let libraries = self
            .link_references
            .iter()
            .flat_map(|(source, libs)| libs.keys().map(move |lib| format!("{}:{}", source, lib)))
            .collect::<Vec<_>>();
        if !libraries.is_empty() {
            bail!(
                "{} needs to be linked against {} before it can be deployed",
                fqn,
                libraries.join(", ")
            );
        }

        let code = self.bytecode.strip_prefix("0x").unwrap_or(&self.bytecode);
        if code.is_empty() {
            bail!("{} is abstract or an interface and can't be deployed", fqn);
        }
        if code.contains("__") {
            bail!("{} contains unlinked library placeholders", fqn);
        }

        Ok(hex::decode(code)
            .with_context(|| format!("invalid bytecode in artifact of {}", fqn))?
            .into())
    }

    pub fn factory<M: Middleware>(&self, client: Arc<M>) -> Result<ContractFactory<M>> {
        Ok(ContractFactory::new(self.abi.clone(), self.creation_code()?, client))
    }
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, name: &FullyQualifiedName) -> PathBuf {
        self.root
            .join(&name.source_name)
            .join(format!("{}.json", name.contract_name))
    }

    fn debug_path(&self, name: &FullyQualifiedName) -> PathBuf {
        self.root
            .join(&name.source_name)
            .join(format!("{}.dbg.json", name.contract_name))
    }

    pub fn read(&self, name: &FullyQualifiedName) -> Result<Artifact> {
        let path = self.artifact_path(name);
        let artifact: Artifact = read_json(&path)
            .with_context(|| format!("artifact for {} not found or unreadable", name))?;

        if artifact.source_name != name.source_name || artifact.contract_name != name.contract_name
        {
            bail!(
                "artifact {} describes {}:{} instead of {}",
                path.display(),
                artifact.source_name,
                artifact.contract_name,
                name
            );
        }
        log::debug!("read artifact {}", path.display());
        Ok(artifact)
    }

    /// Checks the compiler settings recorded in the artifact's build info
    /// against the configured ones. Artifacts without build info are accepted.
    pub fn verify_build_info(
        &self,
        name: &FullyQualifiedName,
        solidity: &SolidityConfig,
    ) -> Result<()> {
        let debug_path = self.debug_path(name);
        if !debug_path.exists() {
            log::warn!("no debug file for {}, skipping compiler check", name);
            return Ok(());
        }
        let debug: DebugFile = read_json(&debug_path)?;

        let build_info_path = debug_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&debug.build_info);
        if !build_info_path.exists() {
            log::warn!(
                "build info {} for {} is missing, skipping compiler check",
                build_info_path.display(),
                name
            );
            return Ok(());
        }
        let build_info: BuildInfo = read_json(&build_info_path)?;

        if build_info.solc_version != solidity.version {
            bail!(
                "{} was compiled with solc {} but {} is configured",
                name,
                build_info.solc_version,
                solidity.version
            );
        }

        let optimizer = &build_info.input.settings.optimizer;
        let runs_match =
            !solidity.optimizer.enabled || optimizer.runs == Some(solidity.optimizer.runs);
        if optimizer.enabled != solidity.optimizer.enabled || !runs_match {
            bail!(
                "{} was compiled with optimizer enabled={} runs={:?} but enabled={} runs={} is configured",
                name,
                optimizer.enabled,
                optimizer.runs,
                solidity.optimizer.enabled,
                solidity.optimizer.runs
            );
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

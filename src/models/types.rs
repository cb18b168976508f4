//! Type definitions shared by the pipeline stages

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Explorer network the contract is deployed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    /// Conflux eSpace mainnet (Etherscan-compatible API)
    #[default]
    Espace,
    /// Conflux eSpace testnet
    EspaceTestnet,
    /// Conflux Core Space mainnet
    Core,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Espace => "espace",
            Network::EspaceTestnet => "espace-testnet",
            Network::Core => "core",
        }
    }

    /// Human-readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Espace => "Conflux eSpace",
            Network::EspaceTestnet => "Conflux eSpace Testnet",
            Network::Core => "Conflux Core Space",
        }
    }

    pub fn is_espace(&self) -> bool {
        matches!(self, Network::Espace | Network::EspaceTestnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "espace" | "evm" => Ok(Network::Espace),
            "espace-testnet" | "testnet" => Ok(Network::EspaceTestnet),
            "core" => Ok(Network::Core),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Verified source as returned by the explorer
#[derive(Debug, Clone)]
pub struct VerifiedSource {
    /// Raw `SourceCode` field (flat text or JSON bundle)
    pub source_code: String,
    /// Contract name, when the explorer reports one
    pub contract_name: Option<String>,
    /// Compiler version the contract was verified with, when reported
    pub compiler_version: Option<String>,
}

/// Where a normalized source file lands in the project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Under `<root>/contracts/`, path relative to that directory
    Contracts(String),
    /// Under `<root>/`, path starts with the dependency directory (e.g. `@openzeppelin/...`)
    Dependency { name: String, path: String },
}

impl SourceLocation {
    /// Path relative to the project root
    pub fn relative_to_root(&self) -> PathBuf {
        match self {
            SourceLocation::Contracts(path) => {
                PathBuf::from(crate::utils::constants::CONTRACTS_DIR).join(path)
            }
            SourceLocation::Dependency { path, .. } => PathBuf::from(path),
        }
    }
}

/// One (path, content) pair produced by the payload classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub location: SourceLocation,
    pub content: String,
}

/// Normalized output of the payload classifier
#[derive(Debug, Clone)]
pub struct ClassifiedSources {
    /// Files in payload order
    pub files: Vec<SourceFile>,
    /// Main contract, relative to the contracts directory
    pub main_contract: String,
    /// Top-level dependency directories seen in the payload
    pub dependencies: BTreeSet<String>,
}

/// On-disk project produced by the materializer. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectLayout {
    /// `<output>/<address>_analysis`
    pub root: PathBuf,
    /// `<root>/contracts`
    pub contracts_dir: PathBuf,
    /// Main contract, relative to `contracts_dir`
    pub main_contract_rel_path: PathBuf,
    /// Dependency directories under `root`
    pub dependencies: BTreeSet<String>,
    /// Every file written, absolute
    #[serde(skip)]
    pub files: Vec<PathBuf>,
}

impl ProjectLayout {
    pub fn main_contract_path(&self) -> PathBuf {
        self.contracts_dir.join(&self.main_contract_rel_path)
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.root.join(crate::utils::constants::REPORT_JSON_FILENAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(crate::utils::constants::SUMMARY_FILENAME)
    }

    pub fn dependency_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Package metadata resolved from the registry, memoized for one run only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Registry package name (e.g. `@openzeppelin/contracts`)
    pub name: String,
    /// Registry kind, always `npm` today
    pub registry: String,
    /// `owner/repo` parsed from the registry's repository URL
    pub github_repo: Option<String>,
    /// Published versions, newest first
    pub versions: Vec<String>,
}

impl DependencySpec {
    pub fn latest_version(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }
}

/// Kind of an import specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `./x.sol`, `../x.sol`
    Relative,
    /// `@scope/pkg/x.sol`
    Scoped,
    /// `x/y.sol`, resolved against the contracts directory
    Bare,
}

/// A classified import, resolved to its absolute target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference {
    pub raw_specifier: String,
    pub kind: ImportKind,
    pub resolved_absolute_path: PathBuf,
}

/// Why the compiler version was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Derived from the pragma
    Pragma,
    /// No usable pragma, fixed fallback used
    Fallback,
}

/// Compiler version selected for the main contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerVersionChoice {
    pub version: String,
    /// Raw pragma expression, if one was found
    pub pragma: Option<String>,
    pub source: VersionSource,
}

/// One dependency the resolver could not materialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyFailure {
    pub specifier: String,
    pub importer: PathBuf,
    pub reason: String,
}

/// Outcome of a best-effort dependency resolution pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    /// Files fetched from the network
    pub fetched: Vec<PathBuf>,
    /// Files linked (or copied) from a dependency tree
    pub linked: Vec<PathBuf>,
    /// Imports whose target already existed
    pub skipped: usize,
    pub failures: Vec<DependencyFailure>,
    /// Dependency directories touched by this pass
    pub dependencies: BTreeSet<String>,
}

impl ResolutionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub address: String,
    pub network: Network,
    pub layout: ProjectLayout,
    pub resolution: ResolutionReport,
    pub compiler: Option<CompilerVersionChoice>,
    pub report_json: Option<PathBuf>,
    /// Analyzer exit status; non-zero usually means findings
    pub analyzer_exit_code: Option<i32>,
    pub summary_markdown: Option<PathBuf>,
}

impl RunSummary {
    /// All dependency directories, from the payload and from resolution
    pub fn all_dependencies(&self) -> BTreeSet<String> {
        self.layout
            .dependencies
            .union(&self.resolution.dependencies)
            .cloned()
            .collect()
    }
}

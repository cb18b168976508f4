//! Configuration module
//!
//! Defaults come from `utils/constants.rs`; environment variables override
//! them, and CLI flags override both (applied in `main.rs`).

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Network;
use crate::utils::constants::{
    CORE_MAINNET_API, DEFAULT_ANALYZER_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_VERSION_MANAGER_TIMEOUT_SECS, ESPACE_MAINNET_API, ESPACE_TESTNET_API,
    GITHUB_RAW_URL, NPM_REGISTRY_URL, SLITHER_BIN, SOLC_SELECT_BIN,
};

/// How the upper bound of a `>=A <B` pragma is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeUpperBound {
    /// `<B` excludes `B` (SemVer semantics)
    #[default]
    Exclusive,
    /// Legacy behaviour: every component of the candidate must lie within
    /// `[A, B]` inclusively
    InclusiveComponentwise,
}

/// Default explorer API base for a network
pub fn default_explorer_url(network: Network) -> &'static str {
    match network {
        Network::Espace => ESPACE_MAINNET_API,
        Network::EspaceTestnet => ESPACE_TESTNET_API,
        Network::Core => CORE_MAINNET_API,
    }
}

/// Configuration for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Explorer network
    pub network: Network,
    /// Explorer API base (env `EXPLORER_API_URL` overrides the network default)
    pub explorer_api_url: String,
    /// Package registry base
    pub registry_url: String,
    /// Raw source-control content base
    pub raw_content_url: String,
    /// Timeout for every HTTP request
    pub http_timeout: Duration,
    /// Static analyzer binary
    pub slither_bin: String,
    /// Compiler version manager binary
    pub solc_select_bin: String,
    /// Analyzer timeout
    pub analyzer_timeout: Duration,
    /// Version manager timeout (install may download a compiler)
    pub version_manager_timeout: Duration,
    /// Directory in which `<address>_analysis` is created
    pub output_dir: PathBuf,
    /// Stop after the project tree is materialized
    pub download_only: bool,
    /// Render line references as ranges
    pub compact_lines: bool,
    /// Pass `--solc-remaps` for each dependency directory
    pub remap_dependencies: bool,
    /// Range pragma upper bound policy
    pub range_upper_bound: RangeUpperBound,
    explorer_url_overridden: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let explorer_override = env_string("EXPLORER_API_URL");
        let network = Network::default();
        Self {
            network,
            explorer_url_overridden: explorer_override.is_some(),
            explorer_api_url: explorer_override
                .unwrap_or_else(|| default_explorer_url(network).to_string()),
            registry_url: env_string("NPM_REGISTRY_URL")
                .unwrap_or_else(|| NPM_REGISTRY_URL.to_string()),
            raw_content_url: env_string("GITHUB_RAW_URL")
                .unwrap_or_else(|| GITHUB_RAW_URL.to_string()),
            http_timeout: env_secs("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            slither_bin: env_string("SLITHER_BIN").unwrap_or_else(|| SLITHER_BIN.to_string()),
            solc_select_bin: env_string("SOLC_SELECT_BIN")
                .unwrap_or_else(|| SOLC_SELECT_BIN.to_string()),
            analyzer_timeout: env_secs("ANALYZER_TIMEOUT_SECS", DEFAULT_ANALYZER_TIMEOUT_SECS),
            version_manager_timeout: env_secs(
                "VERSION_MANAGER_TIMEOUT_SECS",
                DEFAULT_VERSION_MANAGER_TIMEOUT_SECS,
            ),
            output_dir: PathBuf::from("."),
            download_only: false,
            compact_lines: false,
            remap_dependencies: false,
            range_upper_bound: RangeUpperBound::default(),
        }
    }
}

impl AnalysisConfig {
    /// Switch network; the explorer URL follows unless it was set explicitly
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        if !self.explorer_url_overridden {
            self.explorer_api_url = default_explorer_url(network).to_string();
        }
        self
    }

    /// Pin the explorer URL regardless of network
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_api_url = url.into();
        self.explorer_url_overridden = true;
        self
    }

    /// Reject values that would make every request or subprocess fail
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("explorer API URL", &self.explorer_api_url),
            ("registry URL", &self.registry_url),
            ("raw content URL", &self.raw_content_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(AppError::config_invalid(format!(
                    "{} must be an http(s) URL, got {:?}",
                    name, value
                )));
            }
        }
        if self.http_timeout.is_zero()
            || self.analyzer_timeout.is_zero()
            || self.version_manager_timeout.is_zero()
        {
            return Err(AppError::config_invalid("timeouts must be greater than zero"));
        }
        if self.slither_bin.trim().is_empty() || self.solc_select_bin.trim().is_empty() {
            return Err(AppError::config_invalid("tool binaries must not be empty"));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(key: &str, default: u64) -> Duration {
    match env_string(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!("⚠️ Ignoring invalid {}={:?}, using {}s", key, raw, default);
                Duration::from_secs(default)
            }
        },
        None => Duration::from_secs(default),
    }
}

//! Constants Module - Single Source of Truth
//!
//! Endpoints, file names, tool names and the compiler allow-list used
//! across the pipeline. Other modules reference these instead of
//! hardcoding values.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "conflux-slither";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = concat!("conflux-slither/", env!("CARGO_PKG_VERSION"));

// ============================================
// HTTP CONSTANTS
// ============================================

/// Default timeout for explorer / registry / raw-content requests (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Base retry delay for explorer requests (milliseconds)
pub const EXPLORER_BASE_RETRY_MS: u64 = 500;

/// Maximum retry delay for explorer requests (milliseconds)
pub const EXPLORER_MAX_RETRY_MS: u64 = 8000;

/// Maximum attempts for a single explorer request
pub const EXPLORER_MAX_RETRIES: u32 = 4;

/// Jitter percentage applied to retry delays
pub const RETRY_JITTER_PERCENT: u64 = 20;

// ============================================
// EXPLORER / REGISTRY ENDPOINTS
// ============================================

/// ConfluxScan eSpace (Etherscan-compatible) API base
pub const ESPACE_MAINNET_API: &str = "https://evmapi.confluxscan.org";

/// ConfluxScan eSpace testnet API base
pub const ESPACE_TESTNET_API: &str = "https://evmapi-testnet.confluxscan.org";

/// ConfluxScan Core Space API base
pub const CORE_MAINNET_API: &str = "https://api.confluxscan.org";

/// npm registry used for scoped dependency metadata
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Raw content host for GitHub repositories
pub const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Leading character of a scoped (externally managed) import specifier
pub const SCOPED_IMPORT_MARKER: char = '@';

// ============================================
// EXTERNAL TOOLS
// ============================================

/// Static analyzer binary
pub const SLITHER_BIN: &str = "slither";

/// Compiler version manager binary
pub const SOLC_SELECT_BIN: &str = "solc-select";

/// Default analyzer timeout (seconds)
pub const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 600;

/// Default version manager timeout (seconds), covers compiler downloads
pub const DEFAULT_VERSION_MANAGER_TIMEOUT_SECS: u64 = 300;

/// Timeout for `--version` probes (seconds)
pub const TOOL_PROBE_TIMEOUT_SECS: u64 = 30;

/// Base URL of the Slither detector documentation
pub const SLITHER_WIKI_BASE: &str =
    "https://github.com/crytic/slither/wiki/Detector-Documentation";

// ============================================
// ON-DISK LAYOUT
// ============================================

/// Suffix of the per-address project directory (`<address>_analysis`)
pub const ANALYSIS_DIR_SUFFIX: &str = "_analysis";

/// Local contracts directory inside the project root
pub const CONTRACTS_DIR: &str = "contracts";

/// File name used when the payload is a single flattened source
pub const FLAT_CONTRACT_FILENAME: &str = "contract.sol";

/// Analyzer JSON output
pub const REPORT_JSON_FILENAME: &str = "slither_report.json";

/// Rendered Markdown summary
pub const SUMMARY_FILENAME: &str = "analysis_summary.md";

// ============================================
// COMPILER VERSIONS
// ============================================

/// Version used when no usable pragma is found
pub const FALLBACK_SOLC_VERSION: &str = "0.8.19";

/// Compiler releases this tool selects among, newest first
pub const SOLC_ALLOW_LIST: [&str; 33] = [
    "0.8.19", "0.8.17", "0.8.16", "0.8.15", "0.8.14", "0.8.13", "0.8.12", "0.8.11", "0.8.10",
    "0.8.9", "0.8.8", "0.8.7", "0.8.6", "0.8.5", "0.8.4", "0.8.3", "0.8.2", "0.8.1", "0.8.0",
    "0.7.6", "0.7.5", "0.7.4", "0.7.3", "0.7.2", "0.7.1", "0.7.0", "0.6.12", "0.6.11", "0.6.10",
    "0.6.9", "0.6.8", "0.6.7", "0.6.6",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_descending() {
        let parsed: Vec<(u64, u64, u64)> = SOLC_ALLOW_LIST
            .iter()
            .map(|v| {
                let parts: Vec<u64> = v.split('.').map(|p| p.parse().unwrap()).collect();
                (parts[0], parts[1], parts[2])
            })
            .collect();
        for pair in parsed.windows(2) {
            assert!(pair[0] > pair[1], "{:?} should be newer than {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_fallback_is_allow_listed() {
        assert!(SOLC_ALLOW_LIST.contains(&FALLBACK_SOLC_VERSION));
    }
}

//! Tool readiness check
//!
//! Probes the external binaries once at startup. Nothing is installed;
//! a missing tool yields an install hint.

use std::time::Duration;
use tracing::{debug, info};

use crate::models::config::AnalysisConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::TOOL_PROBE_TIMEOUT_SECS;
use crate::utils::process::run_command;

const ANALYZER_HINT: &str = "install it with `pip install slither-analyzer` or set SLITHER_BIN";
const VERSION_MANAGER_HINT: &str = "install it with `pip install solc-select` or set SOLC_SELECT_BIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// Reported version (or first output line)
    Ready(String),
    /// Why the tool is unusable, with an install hint
    Missing(String),
}

impl ToolStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ToolStatus::Ready(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReadiness {
    pub analyzer: ToolStatus,
    pub version_manager: ToolStatus,
}

impl ToolReadiness {
    /// Probe `slither --version` and `solc-select versions`
    pub async fn probe(config: &AnalysisConfig) -> Self {
        let analyzer = probe_tool(&config.slither_bin, &["--version"], ANALYZER_HINT).await;
        let version_manager =
            probe_tool(&config.solc_select_bin, &["versions"], VERSION_MANAGER_HINT).await;
        Self {
            analyzer,
            version_manager,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.analyzer.is_ready() && self.version_manager.is_ready()
    }

    /// `TOOL_UNAVAILABLE` naming every missing tool
    pub fn ensure(&self) -> AppResult<()> {
        let missing: Vec<&str> = [&self.analyzer, &self.version_manager]
            .into_iter()
            .filter_map(|status| match status {
                ToolStatus::Missing(reason) => Some(reason.as_str()),
                ToolStatus::Ready(_) => None,
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::tool_unavailable(missing.join("; ")))
        }
    }
}

async fn probe_tool(bin: &str, args: &[&str], hint: &str) -> ToolStatus {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let result = run_command(
        bin,
        &args,
        None,
        Duration::from_secs(TOOL_PROBE_TIMEOUT_SECS),
        ErrorCode::ToolUnavailable,
    )
    .await;

    match result {
        Ok(output) if output.success() => {
            let version = output
                .stdout
                .lines()
                .chain(output.stderr.lines())
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("available")
                .to_string();
            info!("✅ {} ready ({})", bin, version);
            ToolStatus::Ready(version)
        }
        Ok(output) => {
            debug!("{} probe output: {}", bin, output.combined());
            ToolStatus::Missing(format!(
                "{} is not usable (exit {:?}); {}",
                bin, output.status, hint
            ))
        }
        Err(e) => ToolStatus::Missing(format!("{}; {}", e.message, hint)),
    }
}

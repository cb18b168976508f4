//! Analyzer Invoker
//!
//! Runs `slither <contracts_dir> --json <root>/slither_report.json` from the
//! project root. Slither exits non-zero whenever it reports findings, so the
//! presence of the JSON file decides success and the exit code is only
//! logged.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::AnalysisConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::ProjectLayout;
use crate::utils::process::run_command;

/// Outcome of one analyzer run that produced a report
#[derive(Debug, Clone)]
pub struct AnalyzerRun {
    pub report_json: PathBuf,
    pub exit_code: Option<i32>,
}

pub struct SlitherInvoker {
    bin: String,
    timeout: Duration,
    remap_dependencies: bool,
}

impl SlitherInvoker {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            bin: config.slither_bin.clone(),
            timeout: config.analyzer_timeout,
            remap_dependencies: config.remap_dependencies,
        }
    }

    /// Command-line arguments for `layout`
    pub fn build_args(
        &self,
        layout: &ProjectLayout,
        dependencies: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut args = vec![
            layout.contracts_dir.to_string_lossy().into_owned(),
            "--json".to_string(),
            layout.report_json_path().to_string_lossy().into_owned(),
        ];
        if self.remap_dependencies && !dependencies.is_empty() {
            let remaps: Vec<String> = dependencies
                .iter()
                .map(|dep| format!("{}/={}/", dep, layout.dependency_dir(dep).display()))
                .collect();
            args.push("--solc-remaps".to_string());
            args.push(remaps.join(" "));
        }
        args
    }

    /// Run the analyzer; a missing report is an error carrying the captured output
    pub async fn run(
        &self,
        layout: &ProjectLayout,
        dependencies: &BTreeSet<String>,
    ) -> AppResult<AnalyzerRun> {
        let report_json = layout.report_json_path();
        if report_json.exists() {
            debug!("Removing stale {}", report_json.display());
            std::fs::remove_file(&report_json)?;
        }

        let args = self.build_args(layout, dependencies);
        info!("🔬 Running {} on {}", self.bin, layout.contracts_dir.display());

        let output = run_command(
            &self.bin,
            &args,
            Some(&layout.root),
            self.timeout,
            ErrorCode::AnalyzerFailed,
        )
        .await?;

        if !report_json.is_file() {
            return Err(AppError::analyzer_failed(format!(
                "{} produced no report (exit {:?})\n{}",
                self.bin,
                output.status,
                output.combined()
            )));
        }

        debug!("{} output:\n{}", self.bin, output.combined());
        match output.status {
            Some(0) => info!("✅ Analysis finished, no findings flagged by exit code"),
            Some(code) => info!("✅ Analysis finished (exit {}, findings present)", code),
            None => warn!("⚠️ Analyzer terminated by signal but wrote a report"),
        }

        Ok(AnalyzerRun {
            report_json,
            exit_code: output.status,
        })
    }
}

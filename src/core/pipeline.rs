//! Audit Pipeline
//!
//! Strictly sequential:
//! 1. validate config and address
//! 2. probe external tools (skipped with `download_only`)
//! 3. fetch verified source, or open a tree from an earlier run
//! 4. classify → materialize → resolve dependencies
//! 5. select and activate compiler
//! 6. run analyzer
//! 7. render summary (failure is logged, the run still completes)

use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::core::analyzer::SlitherInvoker;
use crate::core::classifier::classify_payload;
use crate::core::compiler::{select_version, VersionManager};
use crate::core::materializer::{address_from_root, materialize, open_existing};
use crate::core::readiness::ToolReadiness;
use crate::core::report::{write_summary, ReportContext};
use crate::core::resolver::DependencyResolver;
use crate::models::config::AnalysisConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ProjectLayout, RunSummary, VerifiedSource};
use crate::providers::explorer::{validate_address, ExplorerClient};
use crate::providers::registry::RegistryDependencySource;
use crate::providers::DependencySource;

pub struct AuditPipeline<S = RegistryDependencySource> {
    config: AnalysisConfig,
    explorer: ExplorerClient,
    source: S,
}

impl AuditPipeline<RegistryDependencySource> {
    /// Pipeline backed by the network registry and raw-content host
    pub fn new(config: AnalysisConfig) -> AppResult<Self> {
        let source = RegistryDependencySource::new(&config)?;
        Self::with_source(config, source)
    }
}

impl<S: DependencySource> AuditPipeline<S> {
    pub fn with_source(config: AnalysisConfig, source: S) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            explorer: ExplorerClient::new(&config)?,
            config,
            source,
        })
    }

    /// Full run for `address`
    pub async fn run(&self, address: &str) -> AppResult<RunSummary> {
        let address = address.trim();
        validate_address(self.config.network, address)?;

        if !self.config.download_only {
            ToolReadiness::probe(&self.config).await.ensure()?;
        }

        let verified = self.explorer.get_source_code(address).await?;
        self.run_with_source(address, verified).await
    }

    /// Run every stage after the explorer fetch
    pub async fn run_with_source(
        &self,
        address: &str,
        verified: VerifiedSource,
    ) -> AppResult<RunSummary> {
        let started = Instant::now();
        if let Some(reported) = &verified.compiler_version {
            info!("📄 Explorer reports compiler {}", reported);
        }

        let classified = classify_payload(&verified.source_code)?;
        let layout = materialize(&self.config.output_dir, address, &classified)?;
        self.complete(address, layout, verified.contract_name, started)
            .await
    }

    /// Re-analyze a project tree materialized by an earlier run, without
    /// contacting the explorer. Missing imports are still resolved.
    pub async fn analyze_existing(&self, project_dir: &Path) -> AppResult<RunSummary> {
        let started = Instant::now();
        if !self.config.download_only {
            ToolReadiness::probe(&self.config).await.ensure()?;
        }

        let layout = open_existing(project_dir)?;
        let address = address_from_root(&layout.root);
        self.complete(&address, layout, None, started).await
    }

    async fn complete(
        &self,
        address: &str,
        layout: ProjectLayout,
        contract_name: Option<String>,
        started: Instant,
    ) -> AppResult<RunSummary> {
        let mut resolver = DependencyResolver::new(&self.source);
        let resolution = resolver.resolve(&layout).await;
        if !resolution.is_clean() {
            warn!(
                "⚠️ {} dependencies unresolved, analysis may fail to compile",
                resolution.failures.len()
            );
        }

        let mut summary = RunSummary {
            address: address.to_string(),
            network: self.config.network,
            layout,
            resolution,
            compiler: None,
            report_json: None,
            analyzer_exit_code: None,
            summary_markdown: None,
        };

        if self.config.download_only {
            info!(
                "✅ Sources downloaded to {} in {:?}",
                summary.layout.root.display(),
                started.elapsed()
            );
            return Ok(summary);
        }

        let main_source = std::fs::read_to_string(summary.layout.main_contract_path())?;
        let choice = select_version(&main_source, self.config.range_upper_bound);
        info!(
            "🧮 Compiler {} ({:?}{})",
            choice.version,
            choice.source,
            choice
                .pragma
                .as_deref()
                .map(|p| format!(", pragma {}", p))
                .unwrap_or_default()
        );
        VersionManager::new(&self.config).activate(&choice.version).await?;

        let dependencies = summary.all_dependencies();
        let run = SlitherInvoker::new(&self.config)
            .run(&summary.layout, &dependencies)
            .await?;

        let ctx = ReportContext {
            address: Some(address.to_string()),
            network: Some(self.config.network),
            contract_name,
            compiler_version: Some(choice.version.clone()),
            generated_at: Utc::now(),
            compact_lines: self.config.compact_lines,
        };
        let summary_path = summary.layout.summary_path();
        summary.summary_markdown = match write_summary(&run.report_json, &summary_path, &ctx) {
            Ok(()) => Some(summary_path),
            Err(e) => {
                let err = AppError::report_failed(format!("{:#}", e));
                warn!("⚠️ {}", err);
                None
            }
        };
        summary.report_json = Some(run.report_json);
        summary.analyzer_exit_code = run.exit_code;
        summary.compiler = Some(choice);

        info!("✅ Analysis of {} completed in {:?}", address, started.elapsed());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use crate::models::types::DependencySpec;
    use crate::providers::FetchOutcome;

    struct NoDependencies;

    impl DependencySource for NoDependencies {
        async fn package_metadata(&self, _package: &str) -> AppResult<Option<DependencySpec>> {
            Ok(None)
        }

        async fn fetch_file(
            &self,
            _spec: &DependencySpec,
            _candidates: &[String],
        ) -> AppResult<FetchOutcome> {
            Ok(FetchOutcome::NotFound)
        }
    }

    fn config(dir: &std::path::Path) -> AnalysisConfig {
        let mut config = AnalysisConfig::default().with_explorer_url("http://127.0.0.1:9");
        config.registry_url = "http://127.0.0.1:9".to_string();
        config.raw_content_url = "http://127.0.0.1:9".to_string();
        config.output_dir = dir.to_path_buf();
        config.download_only = true;
        config
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = AuditPipeline::with_source(config(tmp.path()), NoDependencies).unwrap();
        let err = pipeline.run("0x1234").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
    }

    #[tokio::test]
    async fn test_download_only_stops_after_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = AuditPipeline::with_source(config(tmp.path()), NoDependencies).unwrap();
        let verified = VerifiedSource {
            source_code: "pragma solidity ^0.8.0;\nimport \"@oz/contracts/A.sol\";\ncontract T {}"
                .to_string(),
            contract_name: Some("T".to_string()),
            compiler_version: None,
        };

        let summary = pipeline.run_with_source("0xabc", verified).await.unwrap();
        assert!(summary.layout.main_contract_path().is_file());
        assert_eq!(summary.resolution.failures.len(), 1);
        assert!(summary.compiler.is_none());
        assert!(summary.report_json.is_none());
    }

    #[tokio::test]
    async fn test_analyze_existing_download_only_resolves_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = AuditPipeline::with_source(config(tmp.path()), NoDependencies).unwrap();
        let verified = VerifiedSource {
            source_code: "import \"./Lib.sol\";\ncontract T {}".to_string(),
            contract_name: None,
            compiler_version: None,
        };
        let first = pipeline.run_with_source("0xabc", verified).await.unwrap();

        let again = pipeline.analyze_existing(&first.layout.root).await.unwrap();
        assert_eq!(again.address, "0xabc");
        assert_eq!(again.layout.main_contract_rel_path, first.layout.main_contract_rel_path);
        assert_eq!(again.resolution.failures.len(), 1);
        assert_eq!(again.resolution.failures[0].specifier, "./Lib.sol");
    }

    #[tokio::test]
    async fn test_analyze_existing_requires_contracts_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = AuditPipeline::with_source(config(tmp.path()), NoDependencies).unwrap();
        let err = pipeline.analyze_existing(tmp.path()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceLayoutInvalid);
    }
}

//! Integration tests for the audit pipeline
//!
//! The registry is replaced by an in-memory source; on unix the analyzer
//! and version manager are shell scripts.

use conflux_slither::models::types::{DependencySpec, VerifiedSource};
use conflux_slither::{AnalysisConfig, AppResult, AuditPipeline, DependencySource, FetchOutcome};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

const MAIN: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.10;

import "@openzeppelin/contracts/access/Ownable.sol";
import "@broken/pkg/Missing.sol";
import "./lib/Math.sol";

contract Vault is Ownable {}
"#;

struct InMemoryRegistry {
    files: HashMap<String, String>,
    fetches: Cell<usize>,
}

impl InMemoryRegistry {
    fn new() -> Self {
        let mut files = HashMap::new();
        files.insert(
            "contracts/access/Ownable.sol".to_string(),
            concat!(
                "pragma solidity ^0.8.0;\n",
                "import \"../utils/Context.sol\";\n",
                "abstract contract Ownable is Context {}"
            )
            .to_string(),
        );
        files.insert(
            "contracts/utils/Context.sol".to_string(),
            "pragma solidity ^0.8.0;\nabstract contract Context {}".to_string(),
        );
        Self {
            files,
            fetches: Cell::new(0),
        }
    }
}

impl DependencySource for InMemoryRegistry {
    async fn package_metadata(&self, package: &str) -> AppResult<Option<DependencySpec>> {
        Ok((package == "@openzeppelin/contracts").then(|| DependencySpec {
            name: package.to_string(),
            registry: "npm".to_string(),
            github_repo: Some("OpenZeppelin/openzeppelin-contracts".to_string()),
            versions: vec!["4.9.3".to_string(), "4.8.0".to_string()],
        }))
    }

    async fn fetch_file(
        &self,
        _spec: &DependencySpec,
        candidates: &[String],
    ) -> AppResult<FetchOutcome> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(candidates
            .iter()
            .find_map(|c| self.files.get(c).cloned())
            .map(FetchOutcome::Fetched)
            .unwrap_or(FetchOutcome::NotFound))
    }
}

fn bundle() -> VerifiedSource {
    let payload = serde_json::json!({
        "language": "Solidity",
        "sources": {
            "contracts/Vault.sol": {"content": MAIN},
            "contracts/lib/Math.sol": {"content": "library Math {}"}
        }
    });
    VerifiedSource {
        source_code: format!("{{{}}}", payload),
        contract_name: Some("Vault".to_string()),
        compiler_version: Some("v0.8.19+commit.7dd6d404".to_string()),
    }
}

fn base_config(output: &Path) -> AnalysisConfig {
    let mut config = AnalysisConfig::default().with_explorer_url("http://127.0.0.1:9");
    config.registry_url = "http://127.0.0.1:9".to_string();
    config.raw_content_url = "http://127.0.0.1:9".to_string();
    config.output_dir = output.to_path_buf();
    config
}

const ADDRESS: &str = "0x1234567890abcdef1234567890abcdef12345678";

#[tokio::test]
async fn test_download_only_rebuilds_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = base_config(tmp.path());
    config.download_only = true;

    let pipeline = AuditPipeline::with_source(config, InMemoryRegistry::new()).unwrap();
    let summary = pipeline.run_with_source(ADDRESS, bundle()).await.unwrap();

    let root = tmp.path().join(format!("{}_analysis", ADDRESS));
    assert_eq!(summary.layout.root, root);
    assert_eq!(summary.layout.main_contract_path(), root.join("contracts/Vault.sol"));
    assert!(root.join("contracts/lib/Math.sol").is_file());
    assert!(root.join("@openzeppelin/contracts/access/Ownable.sol").is_file());
    assert!(root.join("@openzeppelin/contracts/utils/Context.sol").is_file());

    // the broken package is recorded, everything else still materialized
    assert_eq!(summary.resolution.failures.len(), 1);
    assert_eq!(summary.resolution.failures[0].specifier, "@broken/pkg/Missing.sol");
    assert_eq!(summary.resolution.fetched.len(), 2);
    assert!(summary.all_dependencies().contains("@openzeppelin"));
    assert!(summary.compiler.is_none());
}

#[tokio::test]
async fn test_rerun_does_not_refetch() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = base_config(tmp.path());
    config.download_only = true;

    let registry = InMemoryRegistry::new();
    let pipeline = AuditPipeline::with_source(config, &registry).unwrap();
    pipeline.run_with_source(ADDRESS, bundle()).await.unwrap();
    assert_eq!(registry.fetches.get(), 2);

    let second = pipeline.run_with_source(ADDRESS, bundle()).await.unwrap();
    assert_eq!(registry.fetches.get(), 2);
    assert!(second.resolution.fetched.is_empty());
    assert!(second.resolution.skipped >= 3);
}

#[cfg(unix)]
mod with_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    const SLITHER: &str = r#"cat > "$3" <<'JSON'
{"success": true, "error": null, "results": {"detectors": [
  {"check": "reentrancy-eth", "impact": "High", "confidence": "Medium",
   "description": "Reentrancy in Vault.withdraw()\n",
   "elements": [{"source_mapping": {"filename_relative": "contracts/Vault.sol", "lines": [8]}}]},
  {"check": "solc-version", "impact": "Low", "confidence": "High",
   "description": "Pragma version ^0.8.10 allows old versions",
   "elements": [{"source_mapping": {"filename_relative": "contracts/Vault.sol", "lines": [2]}}]}
]}}
JSON
exit 255"#;

    const SOLC_SELECT: &str = r#"echo "$@" >> "$(dirname "$0")/solc-select.log"
case "$1" in
  versions) echo "0.8.19";;
  use) echo "Switched global version to $2";;
  *) exit 1;;
esac"#;

    #[tokio::test]
    async fn test_full_run_writes_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let bin_dir = tmp.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();

        let mut config = base_config(&tmp.path().join("out"));
        config.slither_bin = script(&bin_dir, "slither", SLITHER);
        config.solc_select_bin = script(&bin_dir, "solc-select", SOLC_SELECT);

        let pipeline = AuditPipeline::with_source(config, InMemoryRegistry::new()).unwrap();
        let summary = pipeline.run_with_source(ADDRESS, bundle()).await.unwrap();

        let choice = summary.compiler.as_ref().unwrap();
        assert_eq!(choice.version, "0.8.19");
        let log = std::fs::read_to_string(bin_dir.join("solc-select.log")).unwrap();
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["versions", "use 0.8.19"]);

        assert!(summary.report_json.as_ref().unwrap().is_file());
        assert_eq!(summary.analyzer_exit_code, Some(255));
        let md = std::fs::read_to_string(summary.summary_markdown.as_ref().unwrap()).unwrap();
        assert!(md.starts_with("# Smart Contract Security Analysis Report"));
        assert!(md.contains("- Contract: Vault"));
        assert!(md.contains("## reentrancy-eth"));
        assert!(md.contains("- contracts/Vault.sol#8"));
        let stats: Vec<&str> = md
            .split("## Analysis Statistics\n\n")
            .nth(1)
            .unwrap()
            .lines()
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(stats, vec!["- High: 1 finding", "- Low: 1 finding"]);
    }

    #[tokio::test]
    async fn test_unreadable_report_still_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let bin_dir = tmp.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();

        let mut config = base_config(&tmp.path().join("out"));
        config.slither_bin = script(&bin_dir, "slither", r#"echo "garbage" > "$3"; exit 1"#);
        config.solc_select_bin = script(&bin_dir, "solc-select", SOLC_SELECT);

        let pipeline = AuditPipeline::with_source(config, InMemoryRegistry::new()).unwrap();
        let summary = pipeline.run_with_source(ADDRESS, bundle()).await.unwrap();
        assert!(summary.report_json.is_some());
        assert!(summary.summary_markdown.is_none());
    }

    #[tokio::test]
    async fn test_analyzer_without_report_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let bin_dir = tmp.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();

        let mut config = base_config(&tmp.path().join("out"));
        let body = r#"echo "Error: compilation failed" >&2; exit 1"#;
        config.slither_bin = script(&bin_dir, "slither", body);
        config.solc_select_bin = script(&bin_dir, "solc-select", SOLC_SELECT);

        let pipeline = AuditPipeline::with_source(config, InMemoryRegistry::new()).unwrap();
        let err = pipeline.run_with_source(ADDRESS, bundle()).await.unwrap_err();
        assert_eq!(err.code_str(), "ANALYZER_FAILED");
        assert!(err.message.contains("compilation failed"));
    }
}

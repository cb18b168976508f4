//! npm registry client and the network-backed [`DependencySource`]
//!
//! API: `GET <registry>/<package>` → `{versions: {<v>: {...}}, repository: {url}}`

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::config::AnalysisConfig;
use crate::models::errors::AppResult;
use crate::models::types::DependencySpec;
use crate::providers::raw_content::RawContentClient;
use crate::providers::{build_client, status_error, DependencySource, FetchOutcome};

lazy_static! {
    static ref GITHUB_REPO: Regex =
        Regex::new(r"github\.com[:/]([^/]+/[^/]+?)(\.git)?/?$").unwrap();
    static ref GITHUB_SHORTHAND: Regex =
        Regex::new(r"^(?:github:)?([A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+)$").unwrap();
}

/// Parse a dotted numeric version (`1.2.3`); pre-releases and tags yield `None`
pub fn parse_numeric_version(v: &str) -> Option<Vec<u64>> {
    let parts: Option<Vec<u64>> = v.split('.').map(|p| p.parse::<u64>().ok()).collect();
    parts.filter(|p| !p.is_empty())
}

/// Extract `owner/repo` from a registry `repository` field
pub fn parse_github_repo(repository: &Value) -> Option<String> {
    let url = match repository {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("url").and_then(Value::as_str)?,
        _ => return None,
    };
    if let Some(caps) = GITHUB_REPO.captures(url) {
        return Some(caps[1].to_string());
    }
    GITHUB_SHORTHAND
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Build a [`DependencySpec`] from a registry package document.
///
/// Versions that are not purely dotted-numeric are dropped; the rest are
/// sorted newest first. Returns `None` when no usable version remains.
pub fn parse_package_document(package: &str, doc: &Value) -> Option<DependencySpec> {
    let versions = doc.get("versions").and_then(Value::as_object)?;

    let mut numeric: Vec<(Vec<u64>, String)> = versions
        .keys()
        .filter_map(|v| parse_numeric_version(v).map(|parsed| (parsed, v.clone())))
        .collect();
    if numeric.is_empty() {
        return None;
    }
    numeric.sort_by(|a, b| b.0.cmp(&a.0));

    Some(DependencySpec {
        name: package.to_string(),
        registry: "npm".to_string(),
        github_repo: doc.get("repository").and_then(parse_github_repo),
        versions: numeric.into_iter().map(|(_, v)| v).collect(),
    })
}

/// npm registry client
pub struct NpmRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl NpmRegistryClient {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(config.http_timeout)?,
            base_url: config.registry_url.trim_end_matches('/').to_string(),
        })
    }

    /// Package document URL; the scope separator is percent-encoded
    pub fn package_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package.replace('/', "%2f"))
    }

    /// Fetch metadata for `package`; `Ok(None)` on 404 or when no version is usable
    pub async fn package_metadata(&self, package: &str) -> AppResult<Option<DependencySpec>> {
        let url = self.package_url(package);
        debug!("📦 Registry lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, "registry"));
        }

        let doc: Value = response.json().await?;
        let spec = parse_package_document(package, &doc);
        if let Some(ref s) = spec {
            info!(
                "📦 {}: {} versions, latest {}, repo {}",
                s.name,
                s.versions.len(),
                s.latest_version().unwrap_or("-"),
                s.github_repo.as_deref().unwrap_or("unknown")
            );
        }
        Ok(spec)
    }
}

/// Dependency source backed by the registry and the raw-content host
pub struct RegistryDependencySource {
    registry: NpmRegistryClient,
    raw: RawContentClient,
}

impl RegistryDependencySource {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        Ok(Self {
            registry: NpmRegistryClient::new(config)?,
            raw: RawContentClient::new(config)?,
        })
    }
}

/// Git refs to try for a published version: release tags usually carry a `v`
pub fn candidate_refs(version: &str) -> Vec<String> {
    vec![format!("v{}", version), version.to_string()]
}

/// (ref, path) pairs in the order they are fetched: every path at one ref
/// before moving to the next ref
pub fn fetch_attempts<'a>(
    version: &str,
    candidates: &'a [String],
) -> impl Iterator<Item = (String, &'a str)> + 'a {
    candidate_refs(version).into_iter().flat_map(move |git_ref| {
        candidates
            .iter()
            .map(move |path| (git_ref.clone(), path.as_str()))
    })
}

impl DependencySource for RegistryDependencySource {
    async fn package_metadata(&self, package: &str) -> AppResult<Option<DependencySpec>> {
        self.registry.package_metadata(package).await
    }

    async fn fetch_file(
        &self,
        spec: &DependencySpec,
        candidates: &[String],
    ) -> AppResult<FetchOutcome> {
        let Some(version) = spec.latest_version() else {
            return Ok(FetchOutcome::NotFound);
        };

        if let Some(repo) = spec.github_repo.as_deref() {
            for (git_ref, path) in fetch_attempts(version, candidates) {
                match self.raw.fetch(repo, &git_ref, path).await {
                    Ok(Some(content)) => return Ok(FetchOutcome::Fetched(content)),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "⚠️ Raw content fetch failed for {}@{}/{}: {}",
                        repo, git_ref, path, e
                    ),
                }
            }
        }

        // Registry tarballs would need archive extraction; report it instead of
        // silently returning nothing.
        Ok(FetchOutcome::NotSupported(format!(
            "registry archive fallback is not supported ({}@{})",
            spec.name, version
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_versions_sorted_numerically() {
        let doc = json!({
            "versions": {"4.9.0": {}, "4.10.0": {}, "5.0.0-rc.0": {}, "3.4.2": {}, "5.0.0": {}},
            "repository": {"type": "git", "url": "git+https://github.com/OpenZeppelin/openzeppelin-contracts.git"}
        });
        let spec = parse_package_document("@openzeppelin/contracts", &doc).unwrap();
        assert_eq!(spec.versions, vec!["5.0.0", "4.10.0", "4.9.0", "3.4.2"]);
        assert_eq!(spec.github_repo.as_deref(), Some("OpenZeppelin/openzeppelin-contracts"));
        assert_eq!(spec.latest_version(), Some("5.0.0"));
        assert_eq!(spec.registry, "npm");
    }

    #[test]
    fn test_no_usable_versions() {
        let doc = json!({"versions": {"1.0.0-beta": {}}});
        assert!(parse_package_document("x", &doc).is_none());
        assert!(parse_package_document("x", &json!({})).is_none());
    }

    #[test]
    fn test_repository_forms() {
        assert_eq!(
            parse_github_repo(&json!("git@github.com:owner/repo.git")).as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            parse_github_repo(&json!({"url": "https://github.com/owner/repo"})).as_deref(),
            Some("owner/repo")
        );
        assert_eq!(parse_github_repo(&json!("github:owner/repo")).as_deref(), Some("owner/repo"));
        assert!(parse_github_repo(&json!({"url": "https://gitlab.com/owner/repo"})).is_none());
        assert!(parse_github_repo(&json!(42)).is_none());
    }

    #[test]
    fn test_scoped_package_url() {
        let config = AnalysisConfig::default();
        let mut client = NpmRegistryClient::new(&config).unwrap();
        client.base_url = "https://registry.npmjs.org".to_string();
        assert_eq!(
            client.package_url("@openzeppelin/contracts"),
            "https://registry.npmjs.org/@openzeppelin%2fcontracts"
        );
    }

    #[test]
    fn test_candidate_refs() {
        assert_eq!(candidate_refs("4.9.3"), vec!["v4.9.3", "4.9.3"]);
    }

    fn spec(github_repo: Option<&str>, versions: &[&str]) -> DependencySpec {
        DependencySpec {
            name: "@acme/lib".to_string(),
            registry: "npm".to_string(),
            github_repo: github_repo.map(String::from),
            versions: versions.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn offline_source() -> RegistryDependencySource {
        let mut config = AnalysisConfig::default();
        config.registry_url = "http://127.0.0.1:9".to_string();
        config.raw_content_url = "http://127.0.0.1:9".to_string();
        RegistryDependencySource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_without_repository_falls_back_to_archive() {
        let source = offline_source();
        let outcome = source
            .fetch_file(&spec(None, &["2.1.0", "1.0.0"]), &["lib/Token.sol".to_string()])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::NotSupported(
                "registry archive fallback is not supported (@acme/lib@2.1.0)".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_without_versions_nothing_to_fetch() {
        let source = offline_source();
        let outcome = source
            .fetch_file(&spec(Some("acme/lib"), &[]), &["Token.sol".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[test]
    fn test_tag_refs_and_paths_tried_in_order() {
        let candidates = vec![
            "lib/contracts/Token.sol".to_string(),
            "contracts/Token.sol".to_string(),
        ];
        let attempts: Vec<(String, &str)> = fetch_attempts("2.1.0", &candidates).collect();
        assert_eq!(
            attempts,
            vec![
                ("v2.1.0".to_string(), "lib/contracts/Token.sol"),
                ("v2.1.0".to_string(), "contracts/Token.sol"),
                ("2.1.0".to_string(), "lib/contracts/Token.sol"),
                ("2.1.0".to_string(), "contracts/Token.sol"),
            ]
        );
    }
}

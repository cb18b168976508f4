//! Raw source-control content client
//!
//! API: `GET <raw-host>/<owner/repo>/<ref>/<path>` → file bytes

use reqwest::StatusCode;
use tracing::debug;

use crate::models::config::AnalysisConfig;
use crate::models::errors::AppResult;
use crate::providers::{build_client, status_error};

pub struct RawContentClient {
    client: reqwest::Client,
    base_url: String,
}

impl RawContentClient {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(config.http_timeout)?,
            base_url: config.raw_content_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn file_url(&self, repo: &str, git_ref: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            repo.trim_matches('/'),
            git_ref,
            path.trim_start_matches('/')
        )
    }

    /// File content, or `None` when the host has no such file
    pub async fn fetch(&self, repo: &str, git_ref: &str, path: &str) -> AppResult<Option<String>> {
        let url = self.file_url(repo, git_ref, path);
        debug!("🌐 GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, "raw content host"));
        }
        Ok(Some(response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        let mut config = AnalysisConfig::default();
        config.raw_content_url = "https://raw.githubusercontent.com/".to_string();
        let client = RawContentClient::new(&config).unwrap();
        assert_eq!(
            client.file_url(
                "OpenZeppelin/openzeppelin-contracts",
                "v4.9.3",
                "/contracts/access/Ownable.sol"
            ),
            "https://raw.githubusercontent.com/OpenZeppelin/openzeppelin-contracts/v4.9.3/contracts/access/Ownable.sol"
        );
    }
}

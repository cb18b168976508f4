//! ConfluxScan explorer client
//!
//! Fetches the verified source of a contract.
//!
//! - eSpace (Etherscan-compatible):
//!   `GET <host>/api?module=contract&action=getsourcecode&address=<addr>`
//!   → `{status, message, result: [{SourceCode, ContractName, CompilerVersion}]}`
//! - Core Space:
//!   `GET <host>/contract/getsourcecode?address=<addr>`
//!   → `{code, message, data: {sourceCode, name, compiler}}`

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::info;

use crate::models::config::AnalysisConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Network, VerifiedSource};
use crate::providers::{build_client, get_text_with_retry};

lazy_static! {
    static ref ESPACE_ADDRESS: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
    static ref CORE_ADDRESS: Regex =
        Regex::new(r"(?i)^(cfx|cfxtest|net[0-9]+):(type\.[a-z]+:)?[a-z0-9]{42}$").unwrap();
}

/// Check the address shape expected by `network`
pub fn validate_address(network: Network, address: &str) -> AppResult<()> {
    let ok = if network.is_espace() {
        ESPACE_ADDRESS.is_match(address)
    } else {
        CORE_ADDRESS.is_match(address)
    };
    if ok {
        Ok(())
    } else if network.is_espace() {
        Err(AppError::invalid_address(format!(
            "{:?} is not a 0x-prefixed 20-byte hex address ({})",
            address, network
        )))
    } else {
        Err(AppError::invalid_address(format!(
            "{:?} is not a base32 Core Space address like cfx:aa... ({})",
            address, network
        )))
    }
}

/// Verified-source client for one explorer network
pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
    network: Network,
}

impl ExplorerClient {
    pub fn new(config: &AnalysisConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(config.http_timeout)?,
            base_url: config.explorer_api_url.trim_end_matches('/').to_string(),
            network: config.network,
        })
    }

    /// Verified-source endpoint for `address`
    pub fn source_url(&self, address: &str) -> String {
        if self.network.is_espace() {
            format!(
                "{}/api?module=contract&action=getsourcecode&address={}",
                self.base_url, address
            )
        } else {
            format!("{}/contract/getsourcecode?address={}", self.base_url, address)
        }
    }

    /// Fetch the verified source for `address`
    pub async fn get_source_code(&self, address: &str) -> AppResult<VerifiedSource> {
        let url = self.source_url(address);
        info!("🔍 Fetching source code from {}", url);

        let body = get_text_with_retry(&self.client, &url, "explorer").await?;
        let source = if self.network.is_espace() {
            parse_espace_response(&body, address)?
        } else {
            parse_core_response(&body, address)?
        };

        info!(
            "📄 Verified source received ({} bytes{})",
            source.source_code.len(),
            source
                .contract_name
                .as_deref()
                .map(|n| format!(", contract {}", n))
                .unwrap_or_default()
        );
        Ok(source)
    }
}

fn decode(body: &str) -> AppResult<Value> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        AppError::with_source(
            crate::models::errors::ErrorCode::FetchInvalidResponse,
            format!("explorer response is not JSON: {}", preview),
            e,
        )
    })
}

fn non_empty_string(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse an eSpace (Etherscan-style) `getsourcecode` body
pub fn parse_espace_response(body: &str, address: &str) -> AppResult<VerifiedSource> {
    let data = decode(body)?;

    let status = match data.get("status") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if status != "1" {
        let message =
            non_empty_string(data.get("message")).unwrap_or_else(|| "Unknown error".into());
        let detail = non_empty_string(data.get("result"));
        return Err(AppError::fetch_failed(match detail {
            Some(d) => format!("Error fetching source code: {} ({})", message, d),
            None => format!("Error fetching source code: {}", message),
        }));
    }

    let entry = data
        .get("result")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .ok_or_else(|| AppError::invalid_response("explorer response has no result entry"))?;

    let source_code = entry
        .get("SourceCode")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if source_code.trim().is_empty() {
        return Err(AppError::no_source_found(address));
    }

    Ok(VerifiedSource {
        source_code: source_code.to_string(),
        contract_name: non_empty_string(entry.get("ContractName")),
        compiler_version: non_empty_string(entry.get("CompilerVersion")),
    })
}

/// Parse a Core Space `contract/getsourcecode` body
pub fn parse_core_response(body: &str, address: &str) -> AppResult<VerifiedSource> {
    let data = decode(body)?;

    let code = data.get("code").and_then(Value::as_i64);
    if code != Some(0) {
        let message =
            non_empty_string(data.get("message")).unwrap_or_else(|| "Unknown error".into());
        return Err(AppError::fetch_failed(format!(
            "Error from ConfluxScan API: {} (code {})",
            message,
            code.map(|c| c.to_string()).unwrap_or_else(|| "missing".into())
        )));
    }

    let entry = data
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| AppError::invalid_response("Core Space response has no data object"))?;

    let source_code = entry
        .get("sourceCode")
        .or_else(|| entry.get("SourceCode"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if source_code.trim().is_empty() {
        return Err(AppError::no_source_found(address));
    }

    Ok(VerifiedSource {
        source_code: source_code.to_string(),
        contract_name: non_empty_string(entry.get("name").or_else(|| entry.get("contractName"))),
        compiler_version: non_empty_string(
            entry.get("compiler").or_else(|| entry.get("compilerVersion")),
        ),
    })
}

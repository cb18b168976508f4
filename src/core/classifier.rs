//! Payload Classifier
//!
//! Turns the explorer's `SourceCode` field into (location, content) pairs:
//! 1. Not starting with `{` → one flat `contract.sol`
//! 2. JSON with a `sources` object → standard multi-file bundle
//! 3. Any other JSON, or JSON that fails to parse → flat `contract.sol`
//!
//! Bundle entries under `@scope/...` keep their own subtree next to
//! `contracts/`; everything else lands in `contracts/` with a leading
//! `contracts/` stripped. The first local entry is the main contract.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ClassifiedSources, SourceFile, SourceLocation};
use crate::utils::constants::{CONTRACTS_DIR, FLAT_CONTRACT_FILENAME, SCOPED_IMPORT_MARKER};
use crate::utils::paths::is_safe_relative;

/// Shape of a verified-source payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadShape {
    /// Single flattened source file
    Flat(String),
    /// `sources` entries in document order
    Bundle(Vec<(String, String)>),
    /// Valid JSON without a `sources` object, kept verbatim
    NonStandardJson(String),
}

impl PayloadShape {
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadShape::Flat(_) => "flat",
            PayloadShape::Bundle(_) => "bundle",
            PayloadShape::NonStandardJson(_) => "non-standard JSON",
        }
    }
}

/// Etherscan-compatible explorers wrap standard JSON input as `{{ ... }}`
fn unwrap_double_braces(raw: &str) -> &str {
    let trimmed = raw.trim_end();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn entry_content(path: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => match obj.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => {
                warn!("⚠️ Skipping bundle entry {} (no string content)", path);
                None
            }
        },
        _ => {
            warn!("⚠️ Skipping bundle entry {} (unexpected value type)", path);
            None
        }
    }
}

fn bundle_entries(sources: &Map<String, Value>) -> Vec<(String, String)> {
    sources
        .iter()
        .filter_map(|(path, value)| entry_content(path, value).map(|c| (path.clone(), c)))
        .collect()
}

/// Decide the payload shape
pub fn classify(raw: &str) -> PayloadShape {
    if !raw.starts_with('{') {
        return PayloadShape::Flat(raw.to_string());
    }

    let candidate = unwrap_double_braces(raw);
    let parsed: Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(e) => {
            debug!("Payload starts with '{{' but is not JSON ({}), treating as flat source", e);
            return PayloadShape::Flat(raw.to_string());
        }
    };

    match parsed.get("sources").and_then(Value::as_object) {
        Some(sources) => PayloadShape::Bundle(bundle_entries(sources)),
        None => PayloadShape::NonStandardJson(raw.to_string()),
    }
}

fn flat(content: String) -> ClassifiedSources {
    ClassifiedSources {
        files: vec![SourceFile {
            location: SourceLocation::Contracts(FLAT_CONTRACT_FILENAME.to_string()),
            content,
        }],
        main_contract: FLAT_CONTRACT_FILENAME.to_string(),
        dependencies: BTreeSet::new(),
    }
}

fn locate(path: &str) -> AppResult<SourceLocation> {
    let normalized = path.replace('\\', "/");
    if !is_safe_relative(&normalized) {
        return Err(AppError::layout_invalid(format!(
            "bundle path {:?} is absolute or escapes the project tree",
            path
        )));
    }

    if normalized.starts_with(SCOPED_IMPORT_MARKER) {
        let name = normalized
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        return Ok(SourceLocation::Dependency { name, path: normalized });
    }

    let prefix = format!("{}/", CONTRACTS_DIR);
    let local = normalized
        .strip_prefix(&prefix)
        .unwrap_or(&normalized)
        .to_string();
    if local.is_empty() {
        return Err(AppError::layout_invalid(format!("bundle path {:?} names no file", path)));
    }
    Ok(SourceLocation::Contracts(local))
}

/// Normalize a classified payload into project files
pub fn normalize(shape: PayloadShape) -> AppResult<ClassifiedSources> {
    let entries = match shape {
        PayloadShape::Flat(content) | PayloadShape::NonStandardJson(content) => {
            if content.trim().is_empty() {
                return Err(AppError::layout_invalid("source payload is empty"));
            }
            return Ok(flat(content));
        }
        PayloadShape::Bundle(entries) => entries,
    };

    let mut files = Vec::with_capacity(entries.len());
    let mut dependencies = BTreeSet::new();
    let mut main_contract = None;
    let mut seen = HashSet::new();

    for (path, content) in entries {
        let location = locate(&path)?;
        if !seen.insert(location.relative_to_root()) {
            warn!("⚠️ Duplicate bundle entry {} ignored", path);
            continue;
        }
        match &location {
            SourceLocation::Dependency { name, .. } => {
                dependencies.insert(name.clone());
            }
            SourceLocation::Contracts(local) => {
                if main_contract.is_none() {
                    main_contract = Some(local.clone());
                }
            }
        }
        files.push(SourceFile { location, content });
    }

    let main_contract = main_contract.ok_or_else(|| {
        AppError::layout_invalid("bundle has no local contract to use as the main contract")
    })?;

    Ok(ClassifiedSources {
        files,
        main_contract,
        dependencies,
    })
}

/// Classify and normalize in one step
pub fn classify_payload(raw: &str) -> AppResult<ClassifiedSources> {
    if raw.trim().is_empty() {
        return Err(AppError::layout_invalid("source payload is empty"));
    }
    let shape = classify(raw);
    debug!("Payload classified as {}", shape.kind());
    normalize(shape)
}

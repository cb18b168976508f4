//! Report Renderer
//!
//! Reads the analyzer's JSON document and writes a Markdown summary:
//!
//! ```text
//! # Smart Contract Security Analysis Report
//! ## <check>            one section per rule, first-seen order
//! <description>
//! - <file>#<lines>
//! Reference: <link>
//! ---
//! ## Analysis Statistics
//! - High: 2 findings    zero buckets omitted
//! ```

use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use crate::models::types::Network;
use crate::utils::constants::SLITHER_WIKI_BASE;
use crate::utils::paths::write_file;

// ============================================
// Analyzer JSON schema (subset)
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct SlitherReport {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Option<SlitherResults>,
}

impl SlitherReport {
    pub fn detectors(&self) -> &[Detector] {
        self.results
            .as_ref()
            .map(|r| r.detectors.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SlitherResults {
    #[serde(default)]
    pub detectors: Vec<Detector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detector {
    #[serde(default)]
    pub check: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub wiki: Option<Wiki>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub source_mapping: Option<SourceMapping>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceMapping {
    pub filename: Option<String>,
    pub filename_relative: Option<String>,
    pub filename_short: Option<String>,
    pub filename_absolute: Option<String>,
    #[serde(default)]
    pub lines: Vec<u64>,
}

impl SourceMapping {
    pub fn display_filename(&self) -> Option<&str> {
        [
            &self.filename,
            &self.filename_relative,
            &self.filename_short,
            &self.filename_absolute,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wiki {
    pub url: Option<String>,
}

/// Impact buckets counted in the statistics section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Informational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Informational => "Informational",
        }
    }

    /// Parse an analyzer `impact`; other values (e.g. `Optimization`) are not counted
    pub fn from_impact(impact: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == impact)
    }
}

// ============================================
// Rendering
// ============================================

/// Header metadata for the summary
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub address: Option<String>,
    pub network: Option<Network>,
    pub contract_name: Option<String>,
    pub compiler_version: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Render line lists as ranges (`3-5, 9`)
    pub compact_lines: bool,
}

impl Default for ReportContext {
    fn default() -> Self {
        Self {
            address: None,
            network: None,
            contract_name: None,
            compiler_version: None,
            generated_at: Utc::now(),
            compact_lines: false,
        }
    }
}

/// Collapse line numbers into sorted ranges: `[9, 3, 4, 5]` → `3-5, 9`
pub fn group_lines(lines: &[u64]) -> String {
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut prev) = (first, first);
    for line in iter {
        if line == prev + 1 {
            prev = line;
            continue;
        }
        ranges.push(format_range(start, prev));
        start = line;
        prev = line;
    }
    ranges.push(format_range(start, prev));
    ranges.join(", ")
}

fn format_range(start: u64, end: u64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

fn reference_link(detector: &Detector) -> String {
    detector
        .wiki
        .as_ref()
        .and_then(|w| w.url.as_deref())
        .filter(|u| !u.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("{}#{}", SLITHER_WIKI_BASE, detector.check))
}

/// Findings grouped by rule, in order of first appearance
pub fn group_by_check(detectors: &[Detector]) -> Vec<(&str, Vec<&Detector>)> {
    let mut groups: Vec<(&str, Vec<&Detector>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for detector in detectors {
        let key = detector.check.as_str();
        match index.get(key) {
            Some(&i) => groups[i].1.push(detector),
            None => {
                index.insert(key, groups.len());
                groups.push((key, vec![detector]));
            }
        }
    }
    groups
}

/// Count findings per severity bucket
pub fn severity_histogram(detectors: &[Detector]) -> Vec<(Severity, usize)> {
    let mut counts: HashMap<Severity, usize> = HashMap::new();
    for severity in detectors.iter().filter_map(|d| Severity::from_impact(&d.impact)) {
        *counts.entry(severity).or_default() += 1;
    }
    Severity::ALL
        .into_iter()
        .filter_map(|s| counts.get(&s).map(|&n| (s, n)))
        .collect()
}

fn render_header(out: &mut String, ctx: &ReportContext) {
    out.push_str("# Smart Contract Security Analysis Report\n\n");
    let mut meta = Vec::new();
    if let Some(address) = &ctx.address {
        meta.push(format!("- Address: `{}`", address));
    }
    if let Some(network) = ctx.network {
        meta.push(format!("- Network: {}", network.display_name()));
    }
    if let Some(name) = &ctx.contract_name {
        meta.push(format!("- Contract: {}", name));
    }
    if let Some(version) = &ctx.compiler_version {
        meta.push(format!("- Compiler: solc {}", version));
    }
    meta.push(format!(
        "- Generated: {}",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&meta.join("\n"));
    out.push_str("\n\n");
}

/// Render the Markdown summary
pub fn render_markdown(report: &SlitherReport, ctx: &ReportContext) -> String {
    let mut out = String::new();
    render_header(&mut out, ctx);

    let detectors = report.detectors();
    if detectors.is_empty() {
        out.push_str("No findings reported.\n\n");
    }

    for (check, findings) in group_by_check(detectors) {
        if !check.is_empty() {
            let _ = write!(out, "## {}\n\n", check);
        }
        for finding in findings {
            if let Some(description) = &finding.description {
                let _ = write!(out, "{}\n\n", description.trim_end());
            }
            for mapping in finding.elements.iter().filter_map(|e| e.source_mapping.as_ref()) {
                let Some(filename) = mapping.display_filename() else {
                    continue;
                };
                if mapping.lines.is_empty() {
                    continue;
                }
                let lines = if ctx.compact_lines {
                    group_lines(&mapping.lines)
                } else {
                    mapping
                        .lines
                        .iter()
                        .map(u64::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                };
                let _ = writeln!(out, "- {}#{}", filename, lines);
            }
            if !finding.check.is_empty() {
                let _ = writeln!(out, "\nReference: {}", reference_link(finding));
            }
            out.push_str("\n---\n\n");
        }
    }

    out.push_str("## Analysis Statistics\n\n");
    for (severity, count) in severity_histogram(detectors) {
        let _ = writeln!(
            out,
            "- {}: {} finding{}",
            severity.as_str(),
            count,
            if count > 1 { "s" } else { "" }
        );
    }
    out
}

/// Parse the analyzer report at `json_path`
pub fn load_report(json_path: &Path) -> Result<SlitherReport> {
    let raw = std::fs::read_to_string(json_path)
        .wrap_err_with(|| format!("reading {}", json_path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("parsing {}", json_path.display()))
}

/// Render `json_path` into `summary_path`
pub fn write_summary(json_path: &Path, summary_path: &Path, ctx: &ReportContext) -> Result<()> {
    let report = load_report(json_path)?;
    if report.success == Some(false) {
        if let Some(error) = report.error.as_deref().filter(|e| !e.is_empty()) {
            warn!("⚠️ Analyzer reported an error: {}", error);
        }
    }
    let markdown = render_markdown(&report, ctx);
    write_file(summary_path, &markdown)?;
    info!(
        "📝 Summary written to {} ({} findings)",
        summary_path.display(),
        report.detectors().len()
    );
    Ok(())
}

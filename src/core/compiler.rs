//! Compiler Version Selector
//!
//! Maps `pragma solidity <expr>;` onto the allow-list in
//! `utils/constants.rs`, then installs and activates the version through
//! `solc-select`.
//!
//! | Expression     | Choice                                                         |
//! |----------------|----------------------------------------------------------------|
//! | `^X.Y.Z`       | max `X.Y.*` with patch ≥ Z, else max `X.*`, else `X.Y.Z` as-is |
//! | `~X.Y.Z`       | max `X.Y.*` with patch ≥ Z, else `X.Y.Z` as-is                 |
//! | `>=A <B`       | max allow-listed version in the range, else fallback           |
//! | `>=A`, `<A`    | `A`                                                            |
//! | `X.Y.Z`, `=X.Y.Z` | `X.Y.Z`                                                     |
//! | anything else  | fallback `0.8.19`                                              |

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::imports::strip_comments;
use crate::models::config::{AnalysisConfig, RangeUpperBound};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{CompilerVersionChoice, VersionSource};
use crate::utils::constants::{FALLBACK_SOLC_VERSION, SOLC_ALLOW_LIST};
use crate::utils::process::run_command;

lazy_static! {
    static ref PRAGMA: Regex = Regex::new(r"pragma\s+solidity\s+([^;]+);").unwrap();
    static ref CARET: Regex = Regex::new(r"^\^\s*(\d+\.\d+\.\d+)$").unwrap();
    static ref TILDE: Regex = Regex::new(r"^~\s*(\d+\.\d+\.\d+)$").unwrap();
    static ref RANGE: Regex =
        Regex::new(r"^(>=|>)\s*(\d+\.\d+\.\d+)\s+(<=|<)\s*(\d+\.\d+\.\d+)$").unwrap();
    static ref BOUND: Regex = Regex::new(r"^(?:>=|<=|>|<)\s*(\S+)$").unwrap();
    static ref EXACT: Regex = Regex::new(r"^=?\s*(\d+\.\d+\.\d+)$").unwrap();
}

// ============================================
// Version numbers
// ============================================

/// Strict `major.minor.patch` compiler version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolcVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SolcVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl FromStr for SolcVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("{:?} is not major.minor.patch", s));
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("{:?} is not major.minor.patch", s));
            }
            *slot = part.parse().map_err(|_| format!("{:?} is out of range", s))?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl fmt::Display for SolcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn allow_list() -> Vec<SolcVersion> {
    SOLC_ALLOW_LIST.iter().filter_map(|v| v.parse().ok()).collect()
}

// ============================================
// Pragma handling
// ============================================

/// First `pragma solidity` expression outside comments, whitespace collapsed
pub fn detect_pragma(source: &str) -> Option<String> {
    let cleaned = strip_comments(source);
    PRAGMA
        .captures(&cleaned)
        .map(|caps| caps[1].split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|expr| !expr.is_empty())
}

fn in_range(
    v: SolcVersion,
    lower: (&str, SolcVersion),
    upper: (&str, SolcVersion),
    policy: RangeUpperBound,
) -> bool {
    match policy {
        RangeUpperBound::Exclusive => {
            let lower_ok = match lower.0 {
                ">" => v > lower.1,
                _ => v >= lower.1,
            };
            let upper_ok = match upper.0 {
                "<=" => v <= upper.1,
                _ => v < upper.1,
            };
            lower_ok && upper_ok
        }
        RangeUpperBound::InclusiveComponentwise => {
            let (lo, hi) = (lower.1, upper.1);
            (lo.major..=hi.major).contains(&v.major)
                && (lo.minor..=hi.minor).contains(&v.minor)
                && (lo.patch..=hi.patch).contains(&v.patch)
        }
    }
}

/// Map a pragma expression onto a version, `None` when nothing fits
pub fn version_for_expression(expr: &str, policy: RangeUpperBound) -> Option<String> {
    let expr = expr.trim();
    let allowed = allow_list();

    if let Some(caps) = CARET.captures(expr) {
        let base: SolcVersion = caps[1].parse().ok()?;
        let same_minor = allowed
            .iter()
            .filter(|v| v.major == base.major && v.minor == base.minor && v.patch >= base.patch)
            .max();
        let same_major = || allowed.iter().filter(|v| v.major == base.major).max();
        return Some(
            same_minor
                .or_else(same_major)
                .map(|v| v.to_string())
                .unwrap_or_else(|| caps[1].to_string()),
        );
    }

    if let Some(caps) = TILDE.captures(expr) {
        let base: SolcVersion = caps[1].parse().ok()?;
        return Some(
            allowed
                .iter()
                .filter(|v| v.major == base.major && v.minor == base.minor && v.patch >= base.patch)
                .max()
                .map(|v| v.to_string())
                .unwrap_or_else(|| caps[1].to_string()),
        );
    }

    if let Some(caps) = RANGE.captures(expr) {
        let lower: (&str, SolcVersion) = (caps.get(1)?.as_str(), caps[2].parse().ok()?);
        let upper: (&str, SolcVersion) = (caps.get(3)?.as_str(), caps[4].parse().ok()?);
        return allowed
            .iter()
            .copied()
            .filter(|v| in_range(*v, lower, upper, policy))
            .max()
            .map(|v| v.to_string());
    }

    if let Some(caps) = EXACT.captures(expr) {
        return caps[1].parse::<SolcVersion>().ok().map(|v| v.to_string());
    }

    if let Some(caps) = BOUND.captures(expr) {
        return caps[1].parse::<SolcVersion>().ok().map(|v| v.to_string());
    }

    None
}

fn fallback(pragma: Option<String>) -> CompilerVersionChoice {
    CompilerVersionChoice {
        version: FALLBACK_SOLC_VERSION.to_string(),
        pragma,
        source: VersionSource::Fallback,
    }
}

/// Pick the compiler version for a contract source
pub fn select_version(source: &str, policy: RangeUpperBound) -> CompilerVersionChoice {
    let Some(pragma) = detect_pragma(source) else {
        debug!("No pragma found, using fallback {}", FALLBACK_SOLC_VERSION);
        return fallback(None);
    };

    match version_for_expression(&pragma, policy) {
        Some(version) => CompilerVersionChoice {
            version,
            pragma: Some(pragma),
            source: VersionSource::Pragma,
        },
        None => {
            warn!(
                "⚠️ Cannot map pragma {:?} to a compiler version, using fallback {}",
                pragma, FALLBACK_SOLC_VERSION
            );
            fallback(Some(pragma))
        }
    }
}

// ============================================
// solc-select
// ============================================

/// `solc-select` wrapper
pub struct VersionManager {
    bin: String,
    timeout: Duration,
}

impl VersionManager {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            bin: config.solc_select_bin.clone(),
            timeout: config.version_manager_timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> AppResult<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = run_command(
            &self.bin,
            &args,
            None,
            self.timeout,
            ErrorCode::VersionInstallFailed,
        )
        .await?;
        if !output.success() {
            return Err(AppError::version_install_failed(format!(
                "{} {} exited with {:?}: {}",
                self.bin,
                args.join(" "),
                output.status,
                output.combined()
            )));
        }
        Ok(output.stdout)
    }

    /// Installed versions (first token of each `versions` line)
    pub async fn installed_versions(&self) -> AppResult<Vec<String>> {
        let stdout = self.run(&["versions"]).await?;
        Ok(parse_installed_versions(&stdout))
    }

    pub async fn install(&self, version: &str) -> AppResult<()> {
        info!("⬇️ Installing solc {}", version);
        self.run(&["install", version]).await.map(|_| ())
    }

    pub async fn use_version(&self, version: &str) -> AppResult<()> {
        self.run(&["use", version]).await.map(|_| ())
    }

    /// Install `version` if it is missing, then make it the active compiler
    pub async fn activate(&self, version: &str) -> AppResult<()> {
        let installed = match self.installed_versions().await {
            Ok(v) => v,
            Err(e) if e.code == ErrorCode::ToolUnavailable => return Err(e),
            Err(e) => {
                warn!("⚠️ Cannot list installed compilers: {}", e);
                Vec::new()
            }
        };

        if installed.iter().any(|v| v == version) {
            debug!("solc {} already installed", version);
        } else {
            self.install(version).await?;
        }
        self.use_version(version).await?;
        info!("✅ solc {} active", version);
        Ok(())
    }
}

/// Parse `solc-select versions` output
pub fn parse_installed_versions(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| token.parse::<SolcVersion>().is_ok())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(source: &str) -> String {
        select_version(source, RangeUpperBound::Exclusive).version
    }

    #[test]
    fn test_caret_picks_newest_patch() {
        let choice = select_version("pragma solidity ^0.8.10;", RangeUpperBound::Exclusive);
        assert_eq!(choice.version, "0.8.19");
        assert_eq!(choice.source, VersionSource::Pragma);
        assert_eq!(choice.pragma.as_deref(), Some("^0.8.10"));
        assert_eq!(pick("pragma solidity ^0.7.0;"), "0.7.6");
        assert_eq!(pick("pragma solidity ^0.6.12;"), "0.6.12");
    }

    #[test]
    fn test_caret_falls_back_to_major_then_raw() {
        assert_eq!(pick("pragma solidity ^0.8.20;"), "0.8.19");
        assert_eq!(pick("pragma solidity ^0.5.16;"), "0.8.19");
        assert_eq!(pick("pragma solidity ^1.2.3;"), "1.2.3");
    }

    #[test]
    fn test_range_exclusive_upper_bound() {
        assert_eq!(pick("pragma solidity >=0.6.6 <0.6.9;"), "0.6.8");
        assert_eq!(pick("pragma solidity >=0.6.0 <0.8.0;"), "0.7.6");
        assert_eq!(pick("pragma solidity >=0.7.0 <=0.8.3;"), "0.8.3");
    }

    #[test]
    fn test_range_inclusive_componentwise() {
        let choice = select_version(
            "pragma solidity >=0.6.6 <0.6.9;",
            RangeUpperBound::InclusiveComponentwise,
        );
        assert_eq!(choice.version, "0.6.9");
    }

    #[test]
    fn test_empty_range_uses_fallback() {
        let choice = select_version("pragma solidity >=0.4.0 <0.5.0;", RangeUpperBound::Exclusive);
        assert_eq!(choice.version, "0.8.19");
        assert_eq!(choice.source, VersionSource::Fallback);
        assert_eq!(choice.pragma.as_deref(), Some(">=0.4.0 <0.5.0"));
    }

    #[test]
    fn test_bound_only_and_exact() {
        assert_eq!(pick("pragma solidity >=0.6.2;"), "0.6.2");
        assert_eq!(pick("pragma solidity <0.9.0;"), "0.9.0");
        assert_eq!(pick("pragma solidity 0.8.4;"), "0.8.4");
        assert_eq!(pick("pragma solidity =0.5.17;"), "0.5.17");
        assert_eq!(pick("pragma solidity >=0.8;"), "0.8.19");
    }

    #[test]
    fn test_missing_or_unparseable_pragma() {
        let choice = select_version("contract A {}", RangeUpperBound::Exclusive);
        assert_eq!(choice.version, "0.8.19");
        assert_eq!(choice.source, VersionSource::Fallback);
        assert!(choice.pragma.is_none());
        assert_eq!(pick("pragma solidity garbage;"), "0.8.19");
        assert_eq!(pick("// pragma solidity 0.6.6;\ncontract A {}"), "0.8.19");
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        let v = |s: &str| s.parse::<SolcVersion>().unwrap();
        assert!(v("0.8.10") > v("0.8.9"));
        assert!(v("0.10.0") > v("0.9.9"));
        assert_eq!(v("0.8.19").cmp(&v("0.8.19")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_strict_version_parsing() {
        assert!("0.8.19".parse::<SolcVersion>().is_ok());
        assert!("0.8".parse::<SolcVersion>().is_err());
        assert!("v0.8.19".parse::<SolcVersion>().is_err());
        assert!("0.8.19-nightly".parse::<SolcVersion>().is_err());
    }

    #[test]
    fn test_parse_installed_versions() {
        let out = "0.8.19 (current, set by /root/.solc-select/global-version)\n0.6.12\n";
        assert_eq!(parse_installed_versions(out), vec!["0.8.19", "0.6.12"]);
        let none = "No solc version installed. Run `solc-select install --list` to see all available versions";
        assert!(parse_installed_versions(none).is_empty());
    }

    #[cfg(unix)]
    mod solc_select {
        use super::super::*;
        use crate::utils::process::write_script;

        fn manager(dir: &std::path::Path, body: &str) -> VersionManager {
            let bin = write_script(dir, "solc-select", body);
            let mut config = AnalysisConfig::default();
            config.solc_select_bin = bin.to_string_lossy().into_owned();
            VersionManager::new(&config)
        }

        const FAKE: &str = r#"echo "$@" >> "$(dirname "$0")/calls.log"
case "$1" in
  versions) echo "0.7.6 (current, set by test)";;
  install) echo "Installing $2";;
  use) echo "Switched global version to $2";;
esac"#;

        fn calls(dir: &std::path::Path) -> Vec<String> {
            std::fs::read_to_string(dir.join("calls.log"))
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }

        #[tokio::test]
        async fn test_activate_installs_missing_version() {
            let tmp = tempfile::tempdir().unwrap();
            let vm = manager(tmp.path(), FAKE);
            vm.activate("0.8.19").await.unwrap();
            assert_eq!(calls(tmp.path()), vec!["versions", "install 0.8.19", "use 0.8.19"]);
        }

        #[tokio::test]
        async fn test_activate_skips_installed_version() {
            let tmp = tempfile::tempdir().unwrap();
            let vm = manager(tmp.path(), FAKE);
            vm.activate("0.7.6").await.unwrap();
            assert_eq!(calls(tmp.path()), vec!["versions", "use 0.7.6"]);
        }

        #[tokio::test]
        async fn test_install_failure_is_reported() {
            let tmp = tempfile::tempdir().unwrap();
            let vm = manager(
                tmp.path(),
                r#"case "$1" in
  versions) exit 0;;
  install) echo "no such version" >&2; exit 1;;
esac"#,
            );
            let err = vm.activate("0.4.0").await.unwrap_err();
            assert_eq!(err.code, ErrorCode::VersionInstallFailed);
            assert!(err.message.contains("no such version"));
        }
    }
}

//! Filesystem helpers shared by the materializer and the resolver.

use eyre::{eyre, Result, WrapErr};
use std::path::{Component, Path, PathBuf};

/// Lexically collapse `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above the first component is kept, so callers can
/// detect escapes with [`is_within`].
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Absolute, lexically normalized form of `path`, relative paths taken from
/// the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_lexically(path));
    }
    let cwd = std::env::current_dir().wrap_err("cannot read the current directory")?;
    Ok(normalize_lexically(&cwd.join(path)))
}

/// True when `path` (already normalized) lies inside `root`.
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root) && !path.components().any(|c| c == Component::ParentDir)
}

/// Reject absolute paths and paths that climb out of their base.
pub fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    if p.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    let normalized = normalize_lexically(p);
    !normalized.as_os_str().is_empty()
        && !normalized
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
}

/// Strip leading `./` and `../` segments from an import specifier.
pub fn strip_leading_dots(specifier: &str) -> &str {
    let mut rest = specifier;
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("../") {
            rest = r;
        } else {
            return rest;
        }
    }
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("creating directory {}", parent.display()))?;
    }
    std::fs::write(path, content).wrap_err_with(|| format!("writing {}", path.display()))
}

/// Make `dst` point at `src`: a symlink on unix, a copy elsewhere.
pub fn link_or_copy(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dst)
            .wrap_err_with(|| format!("linking {} -> {}", dst.display(), src.display()))
    }
    #[cfg(not(unix))]
    {
        std::fs::copy(src, dst)
            .map(|_| ())
            .wrap_err_with(|| format!("copying {} -> {}", src.display(), dst.display()))
    }
}

/// Directory name for an address: `<address>_analysis`, with `:` (Core
/// base32 addresses) replaced so the name is portable.
pub fn analysis_dir_name(address: &str) -> Result<String> {
    if address.is_empty() || address.contains(&['/', '\\'][..]) || address.contains("..") {
        return Err(eyre!("address cannot be used as a directory name: {:?}", address));
    }
    Ok(format!(
        "{}{}",
        address.replace(':', "_"),
        crate::utils::constants::ANALYSIS_DIR_SUFFIX
    ))
}

/// Render a path relative to `base` for log output.
pub fn display_relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_dots() {
        let p = normalize_lexically(Path::new("/a/b/./c/../d.sol"));
        assert_eq!(p, PathBuf::from("/a/b/d.sol"));
    }

    #[test]
    fn test_normalize_keeps_leading_parent() {
        let p = normalize_lexically(Path::new("../x/../../y"));
        assert_eq!(p, PathBuf::from("../../y"));
    }

    #[test]
    fn test_is_within() {
        let root = Path::new("/work/0xabc_analysis");
        assert!(is_within(root, Path::new("/work/0xabc_analysis/contracts/A.sol")));
        assert!(!is_within(root, Path::new("/work/other/A.sol")));
    }

    #[test]
    fn test_safe_relative() {
        assert!(is_safe_relative("contracts/A.sol"));
        assert!(is_safe_relative("@oz/contracts/../contracts/A.sol"));
        assert!(!is_safe_relative("../A.sol"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize(Path::new("/a/./b/../c")).unwrap(), PathBuf::from("/a/c"));
        let rel = absolutize(Path::new("./out")).unwrap();
        assert!(rel.is_absolute());
        assert_eq!(rel, std::env::current_dir().unwrap().join("out"));
    }

    #[test]
    fn test_strip_leading_dots() {
        assert_eq!(strip_leading_dots("../../utils/Context.sol"), "utils/Context.sol");
        assert_eq!(strip_leading_dots("./A.sol"), "A.sol");
        assert_eq!(strip_leading_dots("A.sol"), "A.sol");
    }

    #[test]
    fn test_analysis_dir_name() {
        assert_eq!(analysis_dir_name("0xAbC").unwrap(), "0xAbC_analysis");
        assert_eq!(analysis_dir_name("cfx:aa1").unwrap(), "cfx_aa1_analysis");
        assert!(analysis_dir_name("../evil").is_err());
        assert!(analysis_dir_name("").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_or_copy_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.sol");
        std::fs::write(&src, "contract S {}").unwrap();
        let dst = tmp.path().join("nested/dir/dst.sol");
        link_or_copy(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "contract S {}");
    }
}

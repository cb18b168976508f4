//! Project Materializer
//!
//! Layout:
//! ```text
//! <output>/<address>_analysis/
//!   contracts/...          local sources
//!   @scope/...             dependency trees
//!   slither_report.json
//!   analysis_summary.md
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{ClassifiedSources, ProjectLayout};
use crate::utils::constants::{
    ANALYSIS_DIR_SUFFIX, CONTRACTS_DIR, FLAT_CONTRACT_FILENAME, SCOPED_IMPORT_MARKER,
};
use crate::utils::paths::{
    absolutize, analysis_dir_name, is_within, normalize_lexically, write_file,
};

/// Project root for `address` under `output_dir`
pub fn project_root(output_dir: &Path, address: &str) -> AppResult<PathBuf> {
    let name = analysis_dir_name(address).map_err(|e| AppError::invalid_address(e.to_string()))?;
    Ok(absolutize(output_dir)?.join(name))
}

/// Write `sources` to disk and return the resulting layout.
///
/// Existing files with the same path are overwritten, so a re-run refreshes
/// the explorer payload but leaves previously fetched dependencies alone.
pub fn materialize(
    output_dir: &Path,
    address: &str,
    sources: &ClassifiedSources,
) -> AppResult<ProjectLayout> {
    let root = project_root(output_dir, address)?;
    let contracts_dir = root.join(CONTRACTS_DIR);
    std::fs::create_dir_all(&contracts_dir)?;

    let mut files = Vec::with_capacity(sources.files.len());
    for file in &sources.files {
        let path = normalize_lexically(&root.join(file.location.relative_to_root()));
        if !is_within(&root, &path) {
            return Err(AppError::layout_invalid(format!(
                "{} lies outside {}",
                path.display(),
                root.display()
            )));
        }
        write_file(&path, &file.content)?;
        debug!("💾 Saved {}", path.display());
        files.push(path);
    }

    let layout = ProjectLayout {
        main_contract_rel_path: PathBuf::from(&sources.main_contract),
        dependencies: sources.dependencies.clone(),
        root,
        contracts_dir,
        files,
    };

    if !layout.main_contract_path().is_file() {
        return Err(AppError::layout_invalid(format!(
            "main contract {} was not written",
            layout.main_contract_path().display()
        )));
    }

    info!(
        "📁 Project materialized at {} ({} files, main {}, {} dependencies)",
        layout.root.display(),
        layout.files.len(),
        layout.main_contract_rel_path.display(),
        layout.dependencies.len()
    );
    Ok(layout)
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> AppResult<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_sources(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "sol") {
            out.push(path);
        }
    }
    Ok(())
}

/// Address a project directory was materialized for (`<address>_analysis`)
pub fn address_from_root(root: &Path) -> String {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(ANALYSIS_DIR_SUFFIX)
        .unwrap_or(&name)
        .to_string()
}

/// Layout of a project tree already on disk.
///
/// The main contract is `contract.sol` when present, otherwise the first
/// `.sol` file (by name) directly under `contracts/`.
pub fn open_existing(root: &Path) -> AppResult<ProjectLayout> {
    let root = absolutize(root)?;
    let contracts_dir = root.join(CONTRACTS_DIR);
    if !contracts_dir.is_dir() {
        return Err(AppError::layout_invalid(format!(
            "{} has no {} directory",
            root.display(),
            CONTRACTS_DIR
        )));
    }

    let mut files = Vec::new();
    collect_sources(&contracts_dir, &mut files)?;

    let top_level: Vec<&PathBuf> = files
        .iter()
        .filter(|p| p.parent() == Some(contracts_dir.as_path()))
        .collect();
    let main = top_level
        .iter()
        .find(|p| p.file_name().is_some_and(|n| n == FLAT_CONTRACT_FILENAME))
        .or_else(|| top_level.first())
        .and_then(|p| p.file_name())
        .map(PathBuf::from)
        .ok_or_else(|| {
            AppError::layout_invalid(format!("no .sol files in {}", contracts_dir.display()))
        })?;

    let mut dependencies = BTreeSet::new();
    for entry in std::fs::read_dir(&root)?.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(SCOPED_IMPORT_MARKER) && entry.path().is_dir() {
            dependencies.insert(name);
        }
    }

    info!(
        "📁 Existing project at {} ({} sources, main {}, {} dependencies)",
        root.display(),
        files.len(),
        main.display(),
        dependencies.len()
    );
    Ok(ProjectLayout {
        root,
        contracts_dir,
        main_contract_rel_path: main,
        dependencies,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::classify_payload;

    #[test]
    fn test_flat_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = classify_payload("contract A {}").unwrap();
        let layout = materialize(tmp.path(), "0xabc", &sources).unwrap();

        assert_eq!(layout.root, tmp.path().join("0xabc_analysis"));
        assert_eq!(
            layout.main_contract_path(),
            tmp.path().join("0xabc_analysis/contracts/contract.sol")
        );
        assert_eq!(std::fs::read_to_string(layout.main_contract_path()).unwrap(), "contract A {}");
        assert_eq!(layout.files.len(), 1);
    }

    #[test]
    fn test_bundle_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = r#"{"sources":{
            "contracts/A.sol":{"content":"import \"@oz/contracts/B.sol\";"},
            "contracts/B.sol":{"content":"contract B {}"},
            "@oz/contracts/B.sol":{"content":"library OZ {}"}
        }}"#;
        let sources = classify_payload(raw).unwrap();
        let layout = materialize(tmp.path(), "0xabc", &sources).unwrap();

        let root = tmp.path().join("0xabc_analysis");
        assert!(root.join("contracts/A.sol").is_file());
        assert!(root.join("contracts/B.sol").is_file());
        assert!(!root.join("contracts/contracts").exists());
        assert_eq!(
            std::fs::read_to_string(root.join("@oz/contracts/B.sol")).unwrap(),
            "library OZ {}"
        );
        assert!(layout.dependencies.contains("@oz"));
        assert_eq!(layout.main_contract_rel_path, PathBuf::from("A.sol"));
    }

    #[test]
    fn test_relative_output_dir_gives_absolute_root() {
        let root = project_root(Path::new("."), "0xabc").unwrap();
        assert!(root.is_absolute());
        assert_eq!(root, std::env::current_dir().unwrap().join("0xabc_analysis"));
    }

    #[test]
    fn test_core_address_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = classify_payload("contract A {}").unwrap();
        let address = "cfx:aajg4wt2mbmbb44sp6szd783ry0jtad5bea80xdy7p";
        let layout = materialize(tmp.path(), address, &sources).unwrap();
        assert_eq!(
            layout.root.file_name().unwrap().to_string_lossy(),
            "cfx_aajg4wt2mbmbb44sp6szd783ry0jtad5bea80xdy7p_analysis"
        );
    }

    #[test]
    fn test_rematerialize_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = classify_payload("contract A {}").unwrap();
        materialize(tmp.path(), "0xabc", &sources).unwrap();
        let layout = materialize(tmp.path(), "0xabc", &sources).unwrap();
        assert_eq!(layout.files.len(), 1);
    }

    #[test]
    fn test_open_existing_project() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = r#"{"sources":{
            "contracts/Vault.sol":{"content":"contract Vault {}"},
            "contracts/lib/Math.sol":{"content":"library Math {}"},
            "@oz/contracts/B.sol":{"content":"library OZ {}"}
        }}"#;
        let written = materialize(tmp.path(), "0xabc", &classify_payload(raw).unwrap()).unwrap();

        let layout = open_existing(&written.root).unwrap();
        assert_eq!(layout.root, written.root);
        assert_eq!(layout.main_contract_rel_path, PathBuf::from("Vault.sol"));
        assert!(layout.dependencies.contains("@oz"));
        assert_eq!(
            layout.files,
            vec![
                written.root.join("contracts/Vault.sol"),
                written.root.join("contracts/lib/Math.sol"),
            ]
        );
        assert_eq!(address_from_root(&layout.root), "0xabc");
    }

    #[test]
    fn test_open_existing_prefers_flat_contract() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(&tmp.path().join("contracts/Aaa.sol"), "contract Aaa {}").unwrap();
        write_file(&tmp.path().join("contracts/contract.sol"), "contract Main {}").unwrap();
        let layout = open_existing(tmp.path()).unwrap();
        assert_eq!(layout.main_contract_rel_path, PathBuf::from("contract.sol"));
    }

    #[test]
    fn test_open_existing_without_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let err = open_existing(tmp.path()).unwrap_err();
        assert_eq!(err.code, crate::models::errors::ErrorCode::SourceLayoutInvalid);

        std::fs::create_dir_all(tmp.path().join("contracts/sub")).unwrap();
        write_file(&tmp.path().join("contracts/sub/Only.sol"), "contract Only {}").unwrap();
        assert!(open_existing(tmp.path()).is_err());
    }
}

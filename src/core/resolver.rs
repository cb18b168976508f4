//! Dependency Resolver
//!
//! Walks the materialized sources, resolves every import to a path inside
//! the project root and makes sure something exists there:
//!
//! - Scoped (`@scope/pkg/path`): `<root>/<specifier>`, fetched through the
//!   [`DependencySource`] when missing
//! - Relative (`./`, `../`): against the importing file; a target that lands
//!   inside a scoped tree is handled as a scoped import
//! - Bare: against `<root>/contracts`
//!
//! Missing relative/bare targets are linked from a dependency tree holding
//! the same path. Fetched and linked files are scanned in turn. A failure
//! on one import is recorded and the walk continues.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::imports::{classify_specifier, ImportExtractor, RegexImportExtractor};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{
    DependencyFailure, DependencySpec, ImportKind, ImportReference, ProjectLayout,
    ResolutionReport,
};
use crate::providers::{DependencySource, FetchOutcome};
use crate::utils::constants::SCOPED_IMPORT_MARKER;
use crate::utils::paths::{
    display_relative, is_within, link_or_copy, normalize_lexically, strip_leading_dots,
    write_file,
};

/// What happened to one import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Present,
    Fetched,
    Linked,
}

pub struct DependencyResolver<S, E = RegexImportExtractor> {
    source: S,
    extractor: E,
    /// Registry metadata, memoized for this run only
    specs: HashMap<String, Option<DependencySpec>>,
}

impl<S: DependencySource> DependencyResolver<S, RegexImportExtractor> {
    pub fn new(source: S) -> Self {
        Self::with_extractor(source, RegexImportExtractor)
    }
}

impl<S: DependencySource, E: ImportExtractor> DependencyResolver<S, E> {
    pub fn with_extractor(source: S, extractor: E) -> Self {
        Self {
            source,
            extractor,
            specs: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve `specifier` imported from `importer` to an absolute path
    pub fn resolve_reference(
        &self,
        layout: &ProjectLayout,
        importer: &Path,
        specifier: &str,
    ) -> ImportReference {
        let kind = classify_specifier(specifier);
        let joined = match kind {
            ImportKind::Scoped => layout.root.join(specifier),
            ImportKind::Relative => importer
                .parent()
                .unwrap_or(&layout.root)
                .join(specifier),
            ImportKind::Bare => layout.contracts_dir.join(specifier),
        };
        ImportReference {
            raw_specifier: specifier.to_string(),
            kind,
            resolved_absolute_path: normalize_lexically(&joined),
        }
    }

    /// Resolve every import reachable from the layout's files
    pub async fn resolve(&mut self, layout: &ProjectLayout) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        let mut known_deps: BTreeSet<String> = layout.dependencies.clone();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut worklist: VecDeque<PathBuf> = layout
            .files
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == "sol"))
            .cloned()
            .collect();

        info!("🔗 Resolving imports for {} source files", worklist.len());

        while let Some(file) = worklist.pop_front() {
            if !visited.insert(file.clone()) {
                continue;
            }
            let content = match std::fs::read_to_string(&file) {
                Ok(c) => c,
                Err(e) => {
                    warn!("⚠️ Cannot read {}: {}", file.display(), e);
                    continue;
                }
            };

            for specifier in self.extractor.extract(&content) {
                let reference = self.resolve_reference(layout, &file, &specifier);
                let target = reference.resolved_absolute_path.clone();

                match self.resolve_one(layout, &reference, &known_deps).await {
                    Ok(outcome) => {
                        match outcome {
                            Resolved::Present => report.skipped += 1,
                            Resolved::Fetched => {
                                let shown = display_relative(&layout.root, &target);
                                debug!("⬇️ Fetched {}", shown);
                                report.fetched.push(target.clone());
                            }
                            Resolved::Linked => {
                                debug!("🔗 Linked {}", display_relative(&layout.root, &target));
                                report.linked.push(target.clone());
                            }
                        }
                        if let Some(dep) = dependency_dir(&layout.root, &target) {
                            if outcome != Resolved::Present {
                                report.dependencies.insert(dep.clone());
                            }
                            known_deps.insert(dep);
                        }
                        if !visited.contains(&target) {
                            worklist.push_back(target);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ Unresolved import {:?} in {}: {}",
                            specifier,
                            display_relative(&layout.root, &file),
                            e.message
                        );
                        report.failures.push(DependencyFailure {
                            specifier,
                            importer: file
                                .strip_prefix(&layout.root)
                                .unwrap_or(&file)
                                .to_path_buf(),
                            reason: e.message,
                        });
                    }
                }
            }
        }

        info!(
            "✅ Imports resolved: {} fetched, {} linked, {} present, {} failed",
            report.fetched.len(),
            report.linked.len(),
            report.skipped,
            report.failures.len()
        );
        report
    }

    async fn resolve_one(
        &mut self,
        layout: &ProjectLayout,
        reference: &ImportReference,
        known_deps: &BTreeSet<String>,
    ) -> AppResult<Resolved> {
        let target = &reference.resolved_absolute_path;
        if !is_within(&layout.root, target) {
            return Err(AppError::dependency_unresolved(format!(
                "{} resolves outside the project root",
                reference.raw_specifier
            )));
        }
        if target.exists() {
            return Ok(Resolved::Present);
        }

        let rel = display_relative(&layout.root, target);
        if reference.kind == ImportKind::Scoped || rel.starts_with(SCOPED_IMPORT_MARKER) {
            let content = self.fetch_scoped(&rel).await?;
            write_file(target, &content)
                .map_err(|e| AppError::dependency_unresolved(format!("{:#}", e)))?;
            return Ok(Resolved::Fetched);
        }

        match find_in_dependencies(&layout.root, known_deps, &reference.raw_specifier) {
            Some(found) => {
                link_or_copy(&found, target)
                    .map_err(|e| AppError::dependency_unresolved(format!("{:#}", e)))?;
                Ok(Resolved::Linked)
            }
            None => Err(AppError::dependency_unresolved(format!(
                "{} not found locally or in any dependency tree",
                reference.raw_specifier
            ))),
        }
    }

    async fn package_spec(&mut self, package: &str) -> AppResult<Option<DependencySpec>> {
        if let Some(cached) = self.specs.get(package) {
            return Ok(cached.clone());
        }
        let spec = self.source.package_metadata(package).await?;
        self.specs.insert(package.to_string(), spec.clone());
        Ok(spec)
    }

    /// Fetch `@scope/pkg/path` (root-relative)
    async fn fetch_scoped(&mut self, rel: &str) -> AppResult<String> {
        let (package, pkg_name, path) = split_scoped(rel).ok_or_else(|| {
            AppError::dependency_unresolved(format!("{} is not a @scope/package/path import", rel))
        })?;

        let spec = self.package_spec(&package).await?.ok_or_else(|| {
            AppError::dependency_unresolved(format!("package {} not found in registry", package))
        })?;

        // repo path relative to the scope dir first, then to the package
        let candidates = vec![format!("{}/{}", pkg_name, path), path.to_string()];

        match self.source.fetch_file(&spec, &candidates).await? {
            FetchOutcome::Fetched(content) => {
                info!(
                    "📥 Dependency saved: {} ({}@{})",
                    rel,
                    spec.name,
                    spec.latest_version().unwrap_or("?")
                );
                Ok(content)
            }
            FetchOutcome::NotFound => Err(AppError::dependency_unresolved(format!(
                "{} not found in {}",
                rel, spec.name
            ))),
            FetchOutcome::NotSupported(reason) => {
                Err(AppError::dependency_unresolved(format!("{}: {}", rel, reason)))
            }
        }
    }
}

/// Split `@scope/pkg/path/to/File.sol` into (`@scope/pkg`, `pkg`, `path/to/File.sol`)
pub fn split_scoped(rel: &str) -> Option<(String, &str, &str)> {
    let mut parts = rel.splitn(3, '/');
    let scope = parts.next().filter(|s| s.len() > 1 && s.starts_with(SCOPED_IMPORT_MARKER))?;
    let pkg = parts.next().filter(|s| !s.is_empty())?;
    let path = parts.next().filter(|s| !s.is_empty())?;
    Some((format!("{}/{}", scope, pkg), pkg, path))
}

/// Top-level scoped directory holding `target`, if any
fn dependency_dir(root: &Path, target: &Path) -> Option<String> {
    let first = target.strip_prefix(root).ok()?.components().next()?;
    let name = first.as_os_str().to_string_lossy().to_string();
    name.starts_with(SCOPED_IMPORT_MARKER).then_some(name)
}

/// Search known dependency trees for the specifier's path, one package deep
fn find_in_dependencies(
    root: &Path,
    known_deps: &BTreeSet<String>,
    specifier: &str,
) -> Option<PathBuf> {
    let stripped = strip_leading_dots(specifier);
    if stripped.is_empty() {
        return None;
    }

    for dep in known_deps {
        let dep_dir = root.join(dep);
        let direct = normalize_lexically(&dep_dir.join(stripped));
        if is_within(&dep_dir, &direct) && direct.is_file() {
            return Some(direct);
        }

        let mut packages: Vec<PathBuf> = match std::fs::read_dir(&dep_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => continue,
        };
        packages.sort();
        for package in packages {
            let candidate = normalize_lexically(&package.join(stripped));
            if is_within(&package, &candidate) && candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

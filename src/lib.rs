//! Conflux Slither Library
//!
//! Fetches verified Solidity sources from ConfluxScan (eSpace or Core Space),
//! rebuilds a compilable project tree including scoped npm dependencies,
//! selects and activates a matching `solc`, runs Slither and renders its
//! findings as Markdown.

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    AuditPipeline, DependencyResolver, ImportExtractor, RegexImportExtractor, SlitherInvoker,
    ToolReadiness, ToolStatus, VersionManager,
};
pub use models::{
    AnalysisConfig, AppError, AppResult, ErrorCode, Network, RangeUpperBound, RunSummary,
};
pub use providers::{DependencySource, ExplorerClient, FetchOutcome, RegistryDependencySource};

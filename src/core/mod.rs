//! Core Module - Source Reconstruction & Analysis Pipeline
//!
//! Payload classification, project materialization, dependency resolution,
//! compiler selection, analyzer invocation and report rendering.

pub mod analyzer;
pub mod classifier;
pub mod compiler;
pub mod imports;
pub mod materializer;
pub mod pipeline;
pub mod readiness;
pub mod report;
pub mod resolver;

pub use analyzer::*;
pub use classifier::*;
pub use compiler::*;
pub use imports::*;
pub use materializer::*;
pub use pipeline::*;
pub use readiness::*;
pub use report::*;
pub use resolver::*;

//! Utils Module - Helper Functions & Shared Utilities
//!
//! Constants, filesystem helpers and the subprocess runner shared across
//! the pipeline.

pub mod constants;
pub mod paths;
pub mod process;

pub use constants::*;
pub use paths::*;
pub use process::*;

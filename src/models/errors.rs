//! Centralized Error Handling Module
//!
//! Every unrecoverable failure of a run carries a unique code so the
//! operator can tell at a glance which stage broke.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - FETCH_xxx: explorer / registry / raw-content errors
//! - SOURCE_xxx: payload and layout errors
//! - VERSION_xxx: compiler version manager errors
//! - ANALYZER_xxx / REPORT_xxx: analysis stage errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Fetch Errors
    // ============================================
    /// Explorer/registry/raw-content returned a non-success response
    FetchFailed,
    /// Request timed out
    FetchTimeout,
    /// Connection failure, rate limit (HTTP 429) or server error (5xx)
    FetchUnavailable,
    /// Response body could not be decoded
    FetchInvalidResponse,
    /// Explorer returned an empty source field
    NoSourceFound,

    // ============================================
    // Source / Layout Errors
    // ============================================
    /// Address is malformed for the selected network
    InvalidAddress,
    /// Payload could not be turned into a project tree (no main contract, unsafe path)
    SourceLayoutInvalid,
    /// A single dependency could not be resolved (best-effort, non-fatal)
    DependencyUnresolved,

    // ============================================
    // Tooling Errors
    // ============================================
    /// Required external binary is not available
    ToolUnavailable,
    /// Compiler version could not be installed or activated
    VersionInstallFailed,
    /// Analyzer produced no JSON report
    AnalyzerFailed,
    /// Markdown summary could not be generated (non-fatal)
    ReportFailed,

    // ============================================
    // Generic Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Filesystem error
    Io,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchFailed => "FETCH_FAILED",
            Self::FetchTimeout => "FETCH_TIMEOUT",
            Self::FetchUnavailable => "FETCH_UNAVAILABLE",
            Self::FetchInvalidResponse => "FETCH_INVALID_RESPONSE",
            Self::NoSourceFound => "NO_SOURCE_FOUND",

            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::SourceLayoutInvalid => "SOURCE_LAYOUT_INVALID",
            Self::DependencyUnresolved => "DEPENDENCY_UNRESOLVED",

            Self::ToolUnavailable => "TOOL_UNAVAILABLE",
            Self::VersionInstallFailed => "VERSION_INSTALL_FAILED",
            Self::AnalyzerFailed => "ANALYZER_FAILED",
            Self::ReportFailed => "REPORT_FAILED",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::Io => "IO_ERROR",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchTimeout | Self::FetchUnavailable)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Non-success explorer/registry response
    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchFailed, msg)
    }

    /// Transient failure worth retrying
    pub fn fetch_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchUnavailable, msg)
    }

    /// Malformed response body
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchInvalidResponse, msg)
    }

    /// Empty `SourceCode`
    pub fn no_source_found(address: &str) -> Self {
        Self::new(
            ErrorCode::NoSourceFound,
            format!("No source code found for {} (contract not verified?)", address),
        )
    }

    /// Malformed address
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    /// Payload could not be laid out
    pub fn layout_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceLayoutInvalid, msg)
    }

    /// Single dependency failure
    pub fn dependency_unresolved(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DependencyUnresolved, msg)
    }

    /// Missing external binary
    pub fn tool_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolUnavailable, msg)
    }

    /// Compiler install/activation failure
    pub fn version_install_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::VersionInstallFailed, msg)
    }

    /// Analyzer produced no report
    pub fn analyzer_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AnalyzerFailed, msg)
    }

    /// Summary rendering failure
    pub fn report_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReportFailed, msg)
    }

    /// Invalid configuration value
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

/// eyre reports come from the filesystem helpers
impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Io, format!("{:#}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Io, format!("IO error: {}", err), err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::FetchTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::FetchUnavailable, format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::new(ErrorCode::FetchInvalidResponse, err.to_string())
        } else {
            Self::new(ErrorCode::FetchFailed, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::FetchInvalidResponse, "JSON parse error", err)
    }
}

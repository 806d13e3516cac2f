//! Error types for docshift

use std::fmt;
use thiserror::Error;

/// Result type alias for docshift
pub type Result<T> = std::result::Result<T, Error>;

/// The five failure kinds a caller has to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested format pair is not in the registry
    UnsupportedConversion,
    /// Malformed request (page range, artifact count, wrong format, size)
    InvalidInput,
    /// External tool or library failed, could not start, or timed out
    ExecutionFailed,
    /// Tool reported success but the expected output is absent
    OutputMissing,
    /// Referenced artifact no longer exists
    NotFound,
}

impl ErrorKind {
    /// Client errors are caused by the request itself and are never retried.
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::UnsupportedConversion | Self::InvalidInput)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedConversion => write!(f, "UNSUPPORTED_CONVERSION"),
            Self::InvalidInput => write!(f, "INVALID_INPUT"),
            Self::ExecutionFailed => write!(f, "EXECUTION_FAILED"),
            Self::OutputMissing => write!(f, "OUTPUT_MISSING"),
            Self::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

/// Error types for docshift
#[derive(Error, Debug)]
pub enum Error {
    /// No registry entry for the pair
    #[error("Conversion from .{source_ext} to .{target_ext} is not supported")]
    UnsupportedConversion {
        source_ext: String,
        target_ext: String,
    },

    /// Invalid request input
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// External tool or in-process converter failure
    #[error("{tool} failed: {detail}")]
    ExecutionFailed { tool: String, detail: String },

    /// Tool succeeded but produced nothing at the expected location
    #[error("Expected output not found: {path}")]
    OutputMissing { path: String },

    /// Artifact not found
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Input larger than the configured limit
    #[error("Input too large: {size} bytes (max: {max_size} bytes)")]
    InputTooLarge { size: u64, max_size: u64 },

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised while running one conversion pair
    #[error("{pair}: {source}")]
    Conversion {
        pair: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn execution(tool: impl Into<String>, detail: impl fmt::Display) -> Self {
        Error::ExecutionFailed {
            tool: tool.into(),
            detail: detail.to_string(),
        }
    }

    /// Attach the conversion pair without changing the failure kind.
    pub fn in_pair(self, pair: impl fmt::Display) -> Self {
        match self {
            // Already attributed by a nested hop
            Error::Conversion { .. } => self,
            other => Error::Conversion {
                pair: pair.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Classify this error into one of the five caller-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            Error::InvalidInput { .. }
            | Error::InvalidPageRange { .. }
            | Error::PathAccessDenied { .. }
            | Error::InputTooLarge { .. }
            | Error::Config { .. } => ErrorKind::InvalidInput,
            Error::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            Error::OutputMissing { .. } => ErrorKind::OutputMissing,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::ExecutionFailed,
            Error::Conversion { source, .. } => source.kind(),
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Tool diagnostics and filesystem paths are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::UnsupportedConversion {
                source_ext,
                target_ext,
            } => format!(
                "Conversion from .{} to .{} is not supported",
                source_ext, target_ext
            ),
            Error::InvalidInput { reason } => format!("Invalid input: {}", reason),
            Error::InvalidPageRange { range } => format!("Invalid page range: {}", range),
            Error::ExecutionFailed { tool, .. } => format!("Conversion failed in {}", tool),
            Error::OutputMissing { .. } => "Converted file not found on server".to_string(),
            Error::NotFound { .. } => "File not found. It may have expired or was deleted".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::InputTooLarge { max_size, .. } => {
                format!("File is too large. Maximum supported size is {} bytes", max_size)
            }
            Error::Config { .. } => "Server misconfiguration".to_string(),
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "File not found. It may have expired or was deleted".to_string()
            }
            Error::Io(_) => "I/O error".to_string(),
            Error::Conversion { pair, source } => match source.kind() {
                ErrorKind::ExecutionFailed | ErrorKind::OutputMissing => {
                    format!("{} ({})", source.client_message(), pair)
                }
                _ => source.client_message(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_passes_through_conversion_wrapper() {
        let inner = Error::OutputMissing {
            path: "/tmp/x.pdf".to_string(),
        };
        let wrapped = inner.in_pair("docx->pdf");
        assert_eq!(wrapped.kind(), ErrorKind::OutputMissing);
        assert!(wrapped.to_string().starts_with("docx->pdf"));

        // Wrapping twice keeps the innermost pair
        let twice = wrapped.in_pair("pdf->xls");
        assert!(twice.to_string().starts_with("docx->pdf"));
    }

    #[test]
    fn test_io_not_found_is_not_found_kind() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[test]
    fn test_client_message_hides_tool_detail() {
        let err = Error::execution("soffice", "stderr: /secret/path/input.docx: bad zip");
        let msg = err.in_pair("docx->pdf").client_message();
        assert!(!msg.contains("/secret"));
        assert!(msg.contains("soffice"));
        assert!(msg.contains("docx->pdf"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ErrorKind::UnsupportedConversion.is_client_error());
        assert!(ErrorKind::InvalidInput.is_client_error());
        assert!(!ErrorKind::ExecutionFailed.is_client_error());
        assert!(!ErrorKind::OutputMissing.is_client_error());
        assert!(!ErrorKind::NotFound.is_client_error());
    }
}

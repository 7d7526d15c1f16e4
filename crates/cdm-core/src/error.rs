//! Error types for the cdm-decode crates.

use thiserror::Error;

/// Result type alias using CdmError.
pub type CdmResult<T> = Result<T, CdmError>;

/// Primary error type for dataset decoding operations.
#[derive(Debug, Error)]
pub enum CdmError {
    /// File content violates the format's own structural invariants.
    /// Fatal to `open`; the instance is never constructed.
    #[error("Malformed {format} data: {message}")]
    Format { format: String, message: String },

    /// Backing source read/seek failure. Fatal to the in-flight operation
    /// only; already-decoded state stays valid.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied section violates rank or bounds invariants.
    /// Rejected before any I/O is attempted.
    #[error("Invalid section: {0}")]
    InvalidSection(String),

    /// Dense read on a record-stream variable, or a record cursor on a
    /// dense variable.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Operation in the wrong lifecycle state, or a request naming a
    /// variable the decoder never declared.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Cooperative cancellation observed between scan phases.
    #[error("Operation cancelled")]
    Cancelled,
}

impl CdmError {
    /// Shorthand for a format violation in the named format.
    pub fn format(format: &str, message: impl Into<String>) -> Self {
        CdmError::Format {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = CdmError::format("GHCNM", "index magic missing");
        assert_eq!(
            err.to_string(),
            "Malformed GHCNM data: index magic missing"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: CdmError = io.into();
        assert!(matches!(err, CdmError::Io(_)));
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(CdmError::Cancelled.to_string(), "Operation cancelled");
    }
}

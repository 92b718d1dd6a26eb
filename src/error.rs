//! Error types for document normalization

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors that can occur while reading or converting a document
///
/// Metadata and language resolution never produce these: both degrade to
/// documented defaults instead.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Reading the input file or talking to the converter process failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Malformed structural input (e.g. invalid XML)
    #[error("Parse error: {0}")]
    Parse(String),
    /// Converter exited unsuccessfully
    #[error("Conversion failed ({}): {stderr}", describe_status(*status))]
    Conversion {
        /// Exit code, `None` when the process was terminated by a signal
        status: Option<i32>,
        /// Captured error stream text
        stderr: String,
    },
    /// Converter output could not be decoded as text
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// Converter exceeded the configured wall-clock limit
    #[error("Conversion timeout exceeded after {0:?}")]
    Timeout(Duration),
    /// No converter executable could be located
    #[error("Converter executable not found: {0}")]
    ConverterNotFound(String),
    /// No adapter handles the given file
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl DocumentError {
    /// Get numeric error code (used as the CLI exit status)
    pub fn code(&self) -> u32 {
        match self {
            DocumentError::Parse(_) => 1,
            DocumentError::Encoding(_) => 2,
            DocumentError::Timeout(_) => 3,
            DocumentError::Conversion { .. } => 4,
            DocumentError::InvalidInput(_) => 5,
            DocumentError::ConverterNotFound(_) => 6,
            DocumentError::UnsupportedFormat(_) => 7,
            DocumentError::Io { .. } => 8,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocumentError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_message_contains_stderr() {
        let err = DocumentError::Conversion {
            status: Some(1),
            stderr: "boom".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("boom"), "got: {message}");
        assert!(message.contains("exit status 1"), "got: {message}");
    }

    #[test]
    fn test_signal_termination_is_described() {
        let err = DocumentError::Conversion {
            status: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            DocumentError::Parse(String::new()),
            DocumentError::Encoding(String::new()),
            DocumentError::Timeout(Duration::from_secs(1)),
            DocumentError::Conversion {
                status: Some(1),
                stderr: String::new(),
            },
            DocumentError::InvalidInput(String::new()),
            DocumentError::ConverterNotFound(String::new()),
            DocumentError::UnsupportedFormat(String::new()),
            DocumentError::io("x", std::io::Error::other("x")),
        ];
        let mut codes: Vec<u32> = errors.iter().map(DocumentError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Result type for scan orchestration.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Everything that can stop a scan before the scanner reports a verdict.
///
/// A nonzero scanner exit is not represented here: it is a normal `Failed`
/// task result, not an error.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing, conflicting, or malformed task inputs
    #[error("{0}")]
    InputValidation(String),

    /// Host OS the scanner release is not published for
    #[error("{0}")]
    UnsupportedPlatform(String),

    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to extract {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("Failed to set permissions on {}: {source}", .path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program could not be started at all
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Container mode needs a home directory to mount registry credentials
    #[error("Cannot mount registry credentials: HOME is not set")]
    MissingHome,

    #[error("Invalid configuration '{}': {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub(crate) fn input(message: impl Into<String>) -> Self {
        ScanError::InputValidation(message.into())
    }
}

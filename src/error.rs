use std::io;
use thiserror::Error;

/// Custom result type alias for the crate
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Errors that can occur while researching a package
///
/// Nearly all of these are recovered inside a source chain; only
/// [`ResearchError::InvalidPackageName`] ever reaches a caller of
/// [`crate::Researcher::research`].
#[derive(Debug, Error)]
pub enum ResearchError {
    /// I/O errors, including failure to spawn a local tool
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A remote endpoint answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// An external call did not finish within its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A local package-manager tool exited unsuccessfully
    #[error("`{program}` exited with {code:?}: {stderr}")]
    ToolFailed {
        /// Program that was run
        program: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// A source answered but its payload lacked the expected fields
    #[error("Parsing error: {0}")]
    Parse(String),

    /// The requested item does not exist at the queried source
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blank name, or one that could be read as a tool option or reshape a URL
    #[error("Invalid package name: {0:?}")]
    InvalidPackageName(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl ResearchError {
    /// Builds a [`ResearchError::Parse`] from anything printable
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Checks if this error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) | Self::IO(_) => true,
            _ => false,
        }
    }
}

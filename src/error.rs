//! Error types for the run client.

use thiserror::Error;

use crate::status::RunStatus;

/// Result type alias for run client operations.
pub type Result<T> = std::result::Result<T, RunError>;

/// Errors that can occur while talking to the run API.
#[derive(Debug, Error)]
pub enum RunError {
    /// A required client field was missing or empty.
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    /// Call arguments were rejected before any request was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The API answered with a non-2xx status, or a body that could not be decoded.
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A 2xx response lacked a field the client needs.
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// The API reported a status code outside the known table.
    #[error("Unknown run status code: {0}")]
    UnknownStatus(i64),

    /// The run finished in `Error` or `Cancelled`.
    #[error("Run {status}. See why at {link}")]
    RunFailed { status: RunStatus, link: String },

    /// Polling gave up before the run reached a terminal status.
    #[error("Run {run_id} did not finish after {attempts} status checks")]
    PollTimeout { run_id: u64, attempts: usize },

    /// Connection, TLS or timeout failure below the HTTP layer.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Writing an artifact to the caller's sink failed.
    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Create an API error from a status code and raw body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by an [`RunError::Api`] error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(s) if (400..500).contains(&s))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), Some(s) if s >= 500)
    }
}

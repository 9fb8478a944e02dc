//! Error types for the Nauta client

use thiserror::Error;

/// Errors that can occur when using the Nauta clients
#[derive(Error, Debug)]
pub enum NautaError {
    /// Caller supplied malformed input or a state blob that does not belong here
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Server answered with a non-success HTTP status
    #[error("{context} failed with HTTP code: {status}, reason: \"{reason}\"")]
    Transport {
        /// What the client was doing when the request failed
        context: &'static str,
        /// The status code that was received
        status: reqwest::StatusCode,
        /// Canonical reason phrase for the status
        reason: String,
    },

    /// HTTP request could not be completed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Page did not have the expected structure
    #[error("Unrecognized page format: {0}")]
    Parse(String),

    /// Operation is not allowed in the current lifecycle phase
    #[error("Cannot {operation}: {reason}")]
    State {
        /// The rejected operation
        operation: &'static str,
        /// Why the current phase does not allow it
        reason: &'static str,
    },

    /// Requested data was never collected
    #[error("Data unavailable: {0}")]
    Unavailable(String),

    /// Server rejected the request in its response body
    #[error("Server reported failure: {0}")]
    Runtime(String),

    /// State file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file is not valid JSON
    #[error("Failed to (de)serialize session state: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client initialization failed
    #[error("Client initialization failed: {0}")]
    ClientInit(String),
}

impl NautaError {
    /// Build a transport error from a non-success status
    pub(crate) fn transport(context: &'static str, status: reqwest::StatusCode) -> Self {
        NautaError::Transport {
            context,
            status,
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

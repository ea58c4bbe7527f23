//! Error types for the Cirrus server client.

use cirrus_playback::PlaybackError;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Backend answered but refused to sign a URL
    #[error("Server refused to sign URL: {0}")]
    UrlRejected(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl ServerClientError {
    pub(crate) fn from_send(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ServerUnreachable(error.to_string())
        } else {
            Self::Request(error)
        }
    }
}

impl From<ServerClientError> for PlaybackError {
    /// Listing failures surface as catalog errors.
    ///
    /// URL minting maps its errors itself so they carry the track id.
    fn from(error: ServerClientError) -> Self {
        PlaybackError::catalog(error.to_string())
    }
}

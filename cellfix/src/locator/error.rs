//! Error types for online lookups.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the HTTP transport itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The configured endpoint is not a valid URL.
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request could not be sent or its body could not be read.
    #[error("Request failed: {0}")]
    Request(String),
}

/// Why an online lookup produced no location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The service rejected the API key.
    #[error("API key rejected by the location service")]
    InvalidKey,

    /// The key is valid but its quota is used up.
    #[error("API key quota exceeded")]
    QuotaExceeded,

    /// The service has no location for the submitted observations.
    #[error("No location found for the submitted cells")]
    NotFound,

    /// The service could not parse the request.
    #[error("Location service rejected the request as malformed")]
    MalformedRequest,

    /// Non-success status without a recognised error body.
    #[error("Location service returned HTTP {0}")]
    HttpStatus(u16),

    /// The request never got a response.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// No reply within the reply timeout.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The reply body could not be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LookupError {
    /// Whether the failure concerns the API key and should start the cooldown.
    pub fn is_key_failure(&self) -> bool {
        matches!(self, LookupError::InvalidKey | LookupError::QuotaExceeded)
    }

    /// Whether the service answered that it knows no location.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound)
    }
}

impl From<TransportError> for LookupError {
    fn from(e: TransportError) -> Self {
        LookupError::Transport(e.to_string())
    }
}

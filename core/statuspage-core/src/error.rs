//! Error types for statuspage-core operations.
//!
//! Only `Fetch` is meant to reach the user (as inline text next to the last
//! good data). Connection failures surface as a closed connection state, and
//! decode failures never leave the view driver.

use std::path::PathBuf;

use statuspage_protocol::EndpointError;

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("API base address is not configured")]
    MissingBaseUrl,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration read failed: {path}: {source}")]
    ConfigReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    // ─────────────────────────────────────────────────────────────────────
    // Identity Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Credential lookup failed: {0}")]
    Credentials(String),

    #[error("Only admins can {action}")]
    Forbidden { action: String },

    // ─────────────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },

    #[error("Live connection to {endpoint} failed: {details}")]
    Connection { endpoint: String, details: String },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LiveError {
    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        LiveError::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn connection(endpoint: impl ToString, details: impl ToString) -> Self {
        LiveError::Connection {
            endpoint: endpoint.to_string(),
            details: details.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LiveError::Fetch { status: Some(404), .. })
    }
}

/// Convenience type alias for Results using LiveError.
pub type Result<T> = std::result::Result<T, LiveError>;

impl From<LiveError> for String {
    fn from(err: LiveError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_displays_message_only() {
        let err = LiveError::fetch(Some(500), "Failed to fetch incidents");
        assert_eq!(err.to_string(), "Failed to fetch incidents");
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_is_detected_by_status() {
        assert!(LiveError::fetch(Some(404), "Incident not found").is_not_found());
        assert!(!LiveError::fetch(None, "network down").is_not_found());
    }
}

//! Error types for the status proxy

use serde::Serialize;

/// Diagnostics captured when the upstream body is neither JSON nor a page
/// with a recoverable embedded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDiagnostics {
    pub content_type: String,
    pub body_length: usize,
    pub body_preview: String,
    pub has_known_marker: bool,
}

/// Errors that can occur in the status proxy
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("Upstream request failed: {0}")]
    Network(String),

    #[error("Invalid JSON received from upstream API")]
    InvalidUpstreamFormat(Box<FormatDiagnostics>),

    #[error("Service \"{0}\" not found in API response")]
    ServiceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// Diagnostic object attached to the error envelope, if any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ProxyError::Http { status } => Some(serde_json::json!({ "status": status })),
            ProxyError::Network(cause) => Some(serde_json::json!({ "cause": cause })),
            ProxyError::InvalidUpstreamFormat(diagnostics) => {
                serde_json::to_value(diagnostics.as_ref()).ok()
            }
            _ => None,
        }
    }
}

/// Result type alias for status proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

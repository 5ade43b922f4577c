//! Upstream fetcher: retrieves the status document and classifies the answer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::{FormatDiagnostics, ProxyError};
use crate::extractor::{self, FallbackSource, NEXT_DATA_ID};
use crate::io::{HttpClient, HttpResponse};
use crate::model::StatusPayload;

/// Number of characters of an unusable body kept for diagnostics
pub const BODY_PREVIEW_CHARS: usize = 2000;

/// Result of one upstream fetch
#[derive(Debug)]
pub enum UpstreamOutcome {
    /// The body was the JSON document itself
    Json(StatusPayload),
    /// The body was a page; the payload was recovered from an embedded script
    HtmlFallback(StatusPayload, FallbackSource),
    Failure(ProxyError),
}

/// Something that can produce a fresh status payload
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> UpstreamOutcome;
}

/// Fetches the configured upstream URL
pub struct UpstreamFetcher {
    url: String,
    timeout: Duration,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for UpstreamFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamFetcher")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UpstreamFetcher {
    pub fn new(config: &UpstreamConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created UpstreamFetcher for {}", config.url);
        Self {
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            http,
        }
    }
}

#[async_trait]
impl StatusSource for UpstreamFetcher {
    async fn fetch(&self) -> UpstreamOutcome {
        match self.http.get(&self.url, self.timeout).await {
            Ok(response) => classify(&response),
            Err(e) => {
                tracing::error!("Failed to reach upstream {}: {}", self.url, e);
                match e {
                    ProxyError::Network(_) => UpstreamOutcome::Failure(e),
                    other => UpstreamOutcome::Failure(ProxyError::Network(other.to_string())),
                }
            }
        }
    }
}

/// Classify an upstream response by its content
///
/// The `Content-Type` header is only logged: the provider has been seen
/// labelling JSON as HTML and the reverse, so the body decides.
pub fn classify(response: &HttpResponse) -> UpstreamOutcome {
    if !response.is_success() {
        tracing::error!("Upstream HTTP error! status: {}", response.status);
        return UpstreamOutcome::Failure(ProxyError::Http {
            status: response.status,
        });
    }

    let content_type = response.content_type.clone().unwrap_or_default();
    if !content_type.to_ascii_lowercase().contains("application/json") {
        tracing::warn!(
            "Unexpected content type: {}. Attempting HTML fallback.",
            if content_type.is_empty() {
                "unknown"
            } else {
                content_type.as_str()
            }
        );
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => match StatusPayload::from_shape(&value) {
            Some(payload) => return UpstreamOutcome::Json(payload),
            None => tracing::warn!("Upstream JSON has no top-level data/included fields"),
        },
        Err(e) => {
            tracing::error!("Failed to parse upstream JSON: {}", e);
            tracing::error!("Response preview: {}", preview(&response.body));
        }
    }

    match extractor::extract(&response.body) {
        Some(extracted) => {
            tracing::warn!(
                "Extracted payload from HTML fallback ({})",
                extracted.source.as_str()
            );
            UpstreamOutcome::HtmlFallback(extracted.payload, extracted.source)
        }
        None => UpstreamOutcome::Failure(ProxyError::InvalidUpstreamFormat(Box::new(
            FormatDiagnostics {
                content_type,
                body_length: response.body.len(),
                body_preview: preview(&response.body),
                has_known_marker: response.body.contains(NEXT_DATA_ID),
            },
        ))),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

//! Proxy handler: serves the cached payload, refreshes it from upstream when
//! stale, and maps every outcome to a JSON response with stable headers

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::cache::{CachedResponse, Clock, PayloadSource, ResponseCache};
use crate::error::ProxyError;
use crate::fetcher::{StatusSource, UpstreamOutcome};

/// `error` field of every failed status response
pub const ERROR_TITLE: &str = "Failed to fetch service status";

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");
pub const FALLBACK_HEADER: HeaderName = HeaderName::from_static("x-proxy-fallback");
pub const FALLBACK_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-proxy-fallback-source");

/// Body of every 500 response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    pub fn from_error(err: &ProxyError) -> Self {
        Self {
            error: ERROR_TITLE.to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

/// Body of the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub service: String,
    pub version: &'static str,
    pub uptime: String,
}

/// A framework-independent response: status, headers and optional JSON body
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, self.headers, Json(body)).into_response(),
            None => (self.status, self.headers).into_response(),
        }
    }
}

type Refresh = Result<Arc<CachedResponse>, Arc<ProxyError>>;

/// Owns the response cache and the upstream source
pub struct ProxyHandler {
    source: Arc<dyn StatusSource>,
    cache: ResponseCache,
    inflight: Mutex<Option<watch::Receiver<Option<Refresh>>>>,
    clock: Arc<dyn Clock>,
    started_at: Instant,
    service_name: String,
}

impl std::fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("ttl", &self.cache.ttl())
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl ProxyHandler {
    pub fn new(
        source: Arc<dyn StatusSource>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache: ResponseCache::new(ttl, Arc::clone(&clock)),
            inflight: Mutex::new(None),
            started_at: clock.now(),
            clock,
            service_name: service_name.into(),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// GET /api/status
    pub async fn handle_status_request(&self) -> ProxyResponse {
        if let Some(entry) = self.cache.fresh().await {
            tracing::debug!("Serving cached status payload");
            return payload_response(&entry, "HIT");
        }

        match self.refresh().await {
            Ok(entry) => payload_response(&entry, "MISS"),
            Err(err) => {
                tracing::error!("Error fetching status: {}", err);
                error_response(&err)
            }
        }
    }

    /// OPTIONS /api/status
    pub fn handle_preflight(&self) -> ProxyResponse {
        ProxyResponse {
            status: StatusCode::OK,
            headers: cors_headers(),
            body: None,
        }
    }

    /// GET /api/health
    pub fn handle_health(&self) -> ProxyResponse {
        let uptime = self
            .clock
            .now()
            .saturating_duration_since(self.started_at)
            .as_secs();
        let report = HealthReport {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            service: self.service_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            uptime: format!("{}s", uptime),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        );
        json_response(StatusCode::OK, headers, &report)
    }

    /// Fetch a new payload, sharing one upstream call between all callers
    /// that arrive while it is outstanding
    async fn refresh(&self) -> Refresh {
        loop {
            let mut waiting = {
                let mut inflight = self.inflight.lock().await;
                // A closed channel means the previous leader was dropped mid-fetch
                let live = inflight
                    .as_ref()
                    .filter(|rx| rx.has_changed().is_ok())
                    .cloned();
                match live {
                    Some(rx) => rx,
                    None => {
                        if let Some(entry) = self.cache.fresh().await {
                            return Ok(entry);
                        }
                        let (tx, rx) = watch::channel(None);
                        *inflight = Some(rx);
                        drop(inflight);
                        return self.lead_refresh(tx).await;
                    }
                }
            };

            tracing::debug!("Joining in-flight upstream fetch");
            if let Ok(result) = waiting.wait_for(Option::is_some).await {
                if let Some(result) = &*result {
                    return result.clone();
                }
            }
            tracing::debug!("In-flight upstream fetch was abandoned, retrying");
        }
    }

    async fn lead_refresh(&self, tx: watch::Sender<Option<Refresh>>) -> Refresh {
        let result = match self.source.fetch().await {
            UpstreamOutcome::Json(payload) => {
                Ok(self.cache.install(payload, PayloadSource::Json).await)
            }
            UpstreamOutcome::HtmlFallback(payload, source) => Ok(self
                .cache
                .install(payload, PayloadSource::Html(source))
                .await),
            // A failed refresh leaves any previous entry in place
            UpstreamOutcome::Failure(err) => Err(Arc::new(err)),
        };

        tx.send_replace(Some(result.clone()));
        *self.inflight.lock().await = None;
        result
    }
}

fn payload_response(entry: &CachedResponse, cache_status: &'static str) -> ProxyResponse {
    let ttl = entry.ttl_seconds();
    let mut headers = cors_headers();
    set_header(
        &mut headers,
        header::CACHE_CONTROL,
        &format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            ttl,
            ttl * 2
        ),
    );
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status));
    headers.insert(
        FALLBACK_HEADER,
        HeaderValue::from_static(entry.source.fallback_marker()),
    );
    if let Some(source) = entry.source.fallback_source() {
        headers.insert(
            FALLBACK_SOURCE_HEADER,
            HeaderValue::from_static(source.as_str()),
        );
    }
    json_response(StatusCode::OK, headers, &entry.payload)
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!("Dropping invalid {} header {:?}: {}", name, value, e),
    }
}

/// The 500 envelope; never cached by clients or intermediaries
pub fn error_response(err: &ProxyError) -> ProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        headers,
        &ErrorEnvelope::from_error(err),
    )
}

fn json_response<T: Serialize>(status: StatusCode, headers: HeaderMap, body: &T) -> ProxyResponse {
    match serde_json::to_value(body) {
        Ok(body) => ProxyResponse {
            status,
            headers,
            body: Some(body),
        },
        Err(e) => {
            tracing::error!("Failed to serialize response body: {}", e);
            let envelope = ErrorEnvelope::from_error(&ProxyError::Json(e));
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache"),
            );
            ProxyResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                headers,
                body: Some(serde_json::json!({
                    "error": envelope.error,
                    "message": envelope.message,
                })),
            }
        }
    }
}

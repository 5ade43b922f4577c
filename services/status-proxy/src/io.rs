//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request asking for JSON, bounded by `timeout`
    async fn get(&self, url: &str, timeout: Duration) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_USER_AGENT)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, timeout: Duration) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                crate::ProxyError::Network(format!("GET {} failed: {}", url, e))
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| {
            crate::ProxyError::Network(format!("Reading response body: {}", e))
        })?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

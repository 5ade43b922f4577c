//! Status proxy - caching relay for a remote status document
//!
//! Fetches the provider's `{data, included}` status payload, recovers it from
//! the provider's HTML page when the JSON endpoint answers with markup, and
//! serves it with CORS and cache headers.

pub mod cache;
pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod io;
pub mod model;
pub mod proxy;
pub mod server;
pub mod status;

pub use config::{load_config, Config};
pub use error::{ProxyError, Result};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::cache::{Clock, SystemClock};
use crate::fetcher::{StatusSource, UpstreamFetcher};
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::proxy::ProxyHandler;

/// Assembles a [`StatusProxy`] from configuration and optional collaborators
pub struct StatusProxyBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    source: Option<Arc<dyn StatusSource>>,
    clock: Option<Arc<dyn Clock>>,
    cancel: Option<CancellationToken>,
}

impl StatusProxyBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            source: None,
            clock: None,
            cancel: None,
        }
    }

    /// HTTP client used to reach the upstream
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the upstream fetcher entirely
    pub fn with_status_source(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<StatusProxy> {
        self.config.validate()?;

        let source: Arc<dyn StatusSource> = match self.source {
            Some(source) => source,
            None => {
                let http: Arc<dyn HttpClient> = self.http.unwrap_or_else(|| {
                    Arc::new(ReqwestHttpClient::new(
                        self.config.upstream.user_agent.clone(),
                    ))
                });
                Arc::new(UpstreamFetcher::new(&self.config.upstream, http))
            }
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let handler = ProxyHandler::new(
            source,
            Duration::from_secs(self.config.cache.ttl_seconds),
            clock,
            self.config.service_name.clone(),
        );

        tracing::debug!(
            "Built status proxy for {} (ttl {}s)",
            self.config.upstream.url,
            self.config.cache.ttl_seconds
        );

        Ok(StatusProxy {
            config: self.config,
            handler: Arc::new(handler),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// A configured proxy ready to serve
#[derive(Debug)]
pub struct StatusProxy {
    config: Config,
    handler: Arc<ProxyHandler>,
    cancel: CancellationToken,
}

impl StatusProxy {
    pub fn handler(&self) -> Arc<ProxyHandler> {
        Arc::clone(&self.handler)
    }

    pub fn router(&self) -> Router {
        server::build_router(self.handler())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bind the configured address and serve until cancelled
    pub async fn start(self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            ProxyError::Server(format!("Failed to bind {}: {}", addr, e))
        })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            "Status proxy listening on http://{}",
            listener.local_addr()?
        );

        let router = self.router();
        let cancel = self.cancel.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await?;

        tracing::info!("Status proxy stopped");
        Ok(())
    }
}

//! Status client: watches one named service through the proxy
//!
//! This is the data side of a status badge. It keeps a [`ServiceStatusData`]
//! snapshot current and publishes every change to subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::io::HttpClient;
use crate::model::{ServiceResource, ServiceStatus, StatusPayload};

pub const DEFAULT_SERVICE_NAME: &str = "Relayer - Testnet";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Fetches a status payload and picks one service out of it
pub struct StatusClient {
    url: String,
    timeout: Duration,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for StatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusClient")
            .field("url", &self.url)
            .finish()
    }
}

impl StatusClient {
    pub fn new(url: impl Into<String>, timeout: Duration, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.into(),
            timeout,
            http,
        }
    }

    pub async fn fetch_service(&self, service_name: &str) -> crate::Result<ServiceResource> {
        let response = self.http.get(&self.url, self.timeout).await?;
        if !response.is_success() {
            return Err(ProxyError::Http {
                status: response.status,
            });
        }
        let payload: StatusPayload = serde_json::from_str(&response.body)?;
        payload.find_service(service_name)
    }
}

/// Snapshot of a watched service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatusData {
    pub status: ServiceStatus,
    pub availability: f64,
    pub service_name: String,
    pub last_updated: DateTime<Utc>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl ServiceStatusData {
    fn loading(service_name: &str) -> Self {
        Self {
            status: ServiceStatus::Operational,
            availability: 1.0,
            service_name: service_name.to_string(),
            last_updated: Utc::now(),
            is_loading: true,
            error: None,
        }
    }
}

type StatusCallback = Box<dyn Fn(ServiceStatus) + Send + Sync>;

/// Keeps a [`ServiceStatusData`] snapshot up to date
pub struct StatusWatcher {
    client: StatusClient,
    service_name: String,
    state: watch::Sender<ServiceStatusData>,
    refresh_lock: Mutex<()>,
    completed_refreshes: AtomicU64,
    on_status_change: Option<StatusCallback>,
}

impl std::fmt::Debug for StatusWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusWatcher")
            .field("client", &self.client)
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl StatusWatcher {
    pub fn new(client: StatusClient, service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        let (state, _) = watch::channel(ServiceStatusData::loading(&service_name));
        Self {
            client,
            service_name,
            state,
            refresh_lock: Mutex::new(()),
            completed_refreshes: AtomicU64::new(0),
            on_status_change: None,
        }
    }

    /// Call `callback` whenever a refresh observes a different status
    pub fn on_status_change(
        mut self,
        callback: impl Fn(ServiceStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Box::new(callback));
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceStatusData> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ServiceStatusData {
        self.state.borrow().clone()
    }

    /// Refresh the snapshot. A call made while another refresh is running
    /// waits for that one and returns without fetching again.
    pub async fn refresh(&self) {
        let seen = self.completed_refreshes.load(Ordering::SeqCst);
        let _guard = self.refresh_lock.lock().await;
        if self.completed_refreshes.load(Ordering::SeqCst) != seen {
            tracing::debug!("Refresh of '{}' coalesced", self.service_name);
            return;
        }

        match self.client.fetch_service(&self.service_name).await {
            Ok(service) => {
                let new_status = service.attributes.status;
                let previous = self.state.borrow().status;
                self.state.send_modify(|data| {
                    data.status = new_status;
                    data.availability = service.attributes.availability;
                    data.last_updated = Utc::now();
                    data.is_loading = false;
                    data.error = None;
                });
                tracing::debug!("'{}' is {}", self.service_name, new_status);

                if previous != new_status {
                    if let Some(callback) = &self.on_status_change {
                        callback(new_status);
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to refresh '{}': {}", self.service_name, e);
                self.state.send_modify(|data| {
                    data.is_loading = false;
                    data.error = Some(e.to_string());
                });
            }
        }

        self.completed_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    /// Refresh now and then every `interval` (clamped to 30..=300 seconds)
    /// until `cancel` fires
    pub fn spawn_auto_refresh(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = clamp_refresh_interval(interval);
        tokio::spawn(async move {
            loop {
                self.refresh().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {
                        tracing::debug!("Auto refresh for '{}' cancelled", self.service_name);
                        break;
                    }
                }
            }
        })
    }
}

pub fn clamp_refresh_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL)
}

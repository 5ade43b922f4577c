//! BDD test world for the status proxy

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use cucumber::World;
use serde_json::Value;
use status_proxy::cache::ManualClock;
use status_proxy::extractor::Extracted;
use status_proxy::io::{HttpClient, HttpResponse};
use status_proxy::{ProxyError, StatusProxy};

/// What the scripted upstream answers with
#[derive(Debug, Clone)]
pub enum UpstreamReply {
    Respond(HttpResponse),
    Unreachable(String),
}

/// Upstream double that replays one scripted reply and counts requests
#[derive(Debug)]
pub struct ScriptedUpstream {
    reply: Mutex<UpstreamReply>,
    calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new(reply: UpstreamReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reply(&self, reply: UpstreamReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for ScriptedUpstream {
    async fn get(&self, url: &str, _timeout: Duration) -> status_proxy::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            UpstreamReply::Respond(response) => Ok(response),
            UpstreamReply::Unreachable(reason) => Err(ProxyError::Network(format!(
                "GET {} failed: {}",
                url, reason
            ))),
        }
    }
}

/// A response as seen by a client of the proxy
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RecordedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Value {
        self.body.as_ref().expect("response has no JSON body")
    }
}

#[derive(Debug, Default, World)]
pub struct ProxyWorld {
    // Extraction testing
    pub html: Option<String>,
    pub extracted: Option<Option<Extracted>>,
    pub decoded: Option<String>,

    // Proxy testing
    pub upstream: Option<Arc<ScriptedUpstream>>,
    pub clock: Option<Arc<ManualClock>>,
    pub proxy: Option<StatusProxy>,
    pub last_response: Option<RecordedResponse>,
}

/// The status document used across scenarios
pub fn status_document() -> Value {
    serde_json::json!({
        "data": { "id": "42", "type": "status_page", "attributes": { "name": "Zama" } },
        "included": [
            {
                "id": "7",
                "type": "status_page_resource",
                "attributes": {
                    "public_name": "Relayer - Testnet",
                    "status": "operational",
                    "availability": 0.9995,
                    "status_history": []
                }
            }
        ]
    })
}

/// A page carrying `payload` in its hydration script
pub fn hydration_page(payload: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Status</title></head><body><div id="__next"></div><script id="__NEXT_DATA__" type="application/json">{payload}</script></body></html>"#
    )
}

//! BDD step definitions for the status route

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use cucumber::{given, then, when};
use tower::ServiceExt;

use status_proxy::cache::{Clock, ManualClock};
use status_proxy::io::{HttpClient, HttpResponse};
use status_proxy::{Config, StatusProxyBuilder};

use crate::world::{
    hydration_page, status_document, ProxyWorld, RecordedResponse, ScriptedUpstream,
    UpstreamReply,
};

fn reply(status: u16, content_type: &str, body: String) -> UpstreamReply {
    UpstreamReply::Respond(HttpResponse {
        status,
        content_type: Some(content_type.to_string()),
        body,
    })
}

fn upstream(world: &ProxyWorld) -> &ScriptedUpstream {
    world.upstream.as_deref().expect("proxy not set up")
}

fn script(world: &ProxyWorld, reply: UpstreamReply) {
    upstream(world).set_reply(reply);
}

fn response(world: &ProxyWorld) -> &RecordedResponse {
    world.last_response.as_ref().expect("no request sent")
}

fn envelope_field<'a>(world: &'a ProxyWorld, field: &str) -> &'a serde_json::Value {
    &response(world).body()[field]
}

pub async fn send(world: &mut ProxyWorld, method: Method, uri: &str) {
    let router = world.proxy.as_ref().expect("proxy not set up").router();
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };

    world.last_response = Some(RecordedResponse {
        status,
        headers,
        body,
    });
}

fn advance(world: &mut ProxyWorld, seconds: u64) {
    world
        .clock
        .as_ref()
        .expect("proxy not set up")
        .advance(Duration::from_secs(seconds));
}

#[given(expr = "a proxy with a cache TTL of {int} seconds")]
fn proxy_with_ttl(world: &mut ProxyWorld, ttl: u64) {
    let upstream = Arc::new(ScriptedUpstream::new(UpstreamReply::Unreachable(
        "no reply scripted".to_string(),
    )));
    let clock = Arc::new(ManualClock::new());

    let mut config = Config::default();
    config.cache.ttl_seconds = ttl;

    let proxy = StatusProxyBuilder::new(config)
        .with_http_client(Arc::clone(&upstream) as Arc<dyn HttpClient>)
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .expect("proxy builds");

    world.upstream = Some(upstream);
    world.clock = Some(clock);
    world.proxy = Some(proxy);
}

#[given("the upstream answers with the status document as JSON")]
fn upstream_json(world: &mut ProxyWorld) {
    let body = status_document().to_string();
    script(world, reply(200, "application/json; charset=utf-8", body));
}

#[given("the upstream answers with a page embedding the status document")]
fn upstream_html(world: &mut ProxyWorld) {
    let page = hydration_page(&format!(
        r#"{{"props":{{"pageProps":{}}},"page":"/"}}"#,
        status_document()
    ));
    script(world, reply(200, "text/html; charset=utf-8", page));
}

#[given(expr = "the upstream answers with status {int}")]
fn upstream_status(world: &mut ProxyWorld, status: u16) {
    let body = "Service Unavailable".to_string();
    script(world, reply(status, "text/html", body));
}

#[when(expr = "the upstream starts answering with status {int}")]
fn upstream_starts_failing(world: &mut ProxyWorld, status: u16) {
    upstream_status(world, status);
}

#[given("the upstream cannot be reached")]
fn upstream_unreachable(world: &mut ProxyWorld) {
    let reason = "connection refused".to_string();
    script(world, UpstreamReply::Unreachable(reason));
}

#[given(
    expr = "the upstream answers with {int} characters of text that is neither JSON nor a known page"
)]
fn upstream_garbage(world: &mut ProxyWorld, length: usize) {
    script(world, reply(200, "text/plain", "x".repeat(length)));
}

#[given(expr = "{int} seconds pass")]
fn seconds_pass_given(world: &mut ProxyWorld, seconds: u64) {
    advance(world, seconds);
}

#[when(expr = "{int} seconds pass")]
fn seconds_pass(world: &mut ProxyWorld, seconds: u64) {
    advance(world, seconds);
}

#[when("a client requests the status")]
async fn request_status(world: &mut ProxyWorld) {
    send(world, Method::GET, "/api/status").await;
}

#[when("a client sends a preflight request for the status")]
async fn request_preflight(world: &mut ProxyWorld) {
    send(world, Method::OPTIONS, "/api/status").await;
}

#[when(expr = "a client requests {string}")]
async fn request_path(world: &mut ProxyWorld, path: String) {
    send(world, Method::GET, &path).await;
}

#[then(expr = "the response status is {int}")]
fn response_status(world: &mut ProxyWorld, status: u16) {
    assert_eq!(response(world).status, status);
}

#[then(expr = "the response header {string} is {string}")]
fn response_header(world: &mut ProxyWorld, name: String, value: String) {
    assert_eq!(response(world).header(&name), Some(value.as_str()));
}

#[then("the response body is the status document")]
fn body_is_document(world: &mut ProxyWorld) {
    assert_eq!(response(world).body(), &status_document());
}

#[then("the response has no body")]
fn response_has_no_body(world: &mut ProxyWorld) {
    assert!(response(world).body.is_none());
}

#[then(expr = "the error message is {string}")]
fn error_message(world: &mut ProxyWorld, message: String) {
    assert_eq!(envelope_field(world, "message"), message.as_str());
}

#[then(expr = "the error title is {string}")]
fn error_title(world: &mut ProxyWorld, title: String) {
    assert_eq!(envelope_field(world, "error"), title.as_str());
}

#[then(expr = "the error details carry a body preview of {int} characters")]
fn error_preview(world: &mut ProxyWorld, length: usize) {
    let details = envelope_field(world, "details");
    let preview = details["bodyPreview"].as_str().expect("bodyPreview missing");
    assert_eq!(preview.chars().count(), length);
    assert!(details["bodyLength"].as_u64().unwrap() as usize >= length);
}

#[then("the error details report no known marker")]
fn error_no_marker(world: &mut ProxyWorld) {
    assert_eq!(envelope_field(world, "details")["hasKnownMarker"], false);
}

#[then(expr = "the upstream was contacted {int} time(s)")]
fn upstream_calls(world: &mut ProxyWorld, calls: usize) {
    assert_eq!(upstream(world).calls(), calls);
}

//! HTTP surface: status, preflight and health routes

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::proxy::{ProxyHandler, ProxyResponse};

/// Build the proxy's axum router
pub fn build_router(handler: Arc<ProxyHandler>) -> Router {
    Router::new()
        .route(
            "/api/status",
            get(status_handler).options(preflight_handler),
        )
        .route("/api/health", get(health_handler))
        .fallback(fallback_handler)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn status_handler(State(handler): State<Arc<ProxyHandler>>) -> ProxyResponse {
    handler.handle_status_request().await
}

async fn preflight_handler(State(handler): State<Arc<ProxyHandler>>) -> ProxyResponse {
    handler.handle_preflight()
}

async fn health_handler(State(handler): State<Arc<ProxyHandler>>) -> ProxyResponse {
    handler.handle_health()
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    tracing::warn!(
        "Unexpected route targeted: {} {}",
        req.method(),
        req.uri().path()
    );

    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not Found",
            "message": format!("No route for {} {}", req.method(), req.uri().path()),
        })),
    )
}

//! Route handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::request::request_id;
use crate::lifecycle::ResilienceCore;
use crate::security::{screen, RequestKind};

pub type AppState = Arc<ResilienceCore>;

/// Full health report. Always 200; degradation is in the payload.
pub async fn health(State(core): State<AppState>) -> Response {
    let report = core.health.run_all().await;
    (StatusCode::OK, Json(report)).into_response()
}

/// Last known check states and alerts, without running any check.
pub async fn health_summary(State(core): State<AppState>) -> Response {
    Json(core.health.summary()).into_response()
}

pub async fn ping() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
    .into_response()
}

pub async fn metrics(State(core): State<AppState>) -> Response {
    Json(json!({
        "summary": core.health.summary(),
        "cache": core.cache.stats(),
        "rate_limiter": {
            "tracked_keys": core.limiter.len(),
            "max_keys": core.limiter.max_keys(),
        },
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    pub pattern: Option<String>,
}

/// Clear the namespace, or keys matching `pattern` inside it.
pub async fn clear_cache(State(core): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: ClearCacheRequest = if body.is_empty() {
        ClearCacheRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"code": "INVALID_JSON", "message": e.to_string()}})),
                )
                    .into_response()
            }
        }
    };

    // Patterns are confined to this service's namespace.
    let namespace = core.cache.namespace();
    let pattern = match request.pattern {
        Some(p) if p.starts_with(&format!("{}:", namespace)) => p,
        Some(p) => format!("{}:{}", namespace, p),
        None => format!("{}:*", namespace),
    };

    let cleared = core.cache.clear(Some(&pattern)).await;
    tracing::info!(
        request_id = %request_id(&headers),
        pattern = %pattern,
        cleared,
        "Cache clear requested"
    );

    let status = if cleared {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({"success": cleared, "pattern": pattern}))).into_response()
}

/// Validation-gated endpoint; echoes the sanitized body.
pub async fn api(
    State(core): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Response {
    let kind: RequestKind = match kind.parse() {
        Ok(kind) => kind,
        Err(message) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": "UNKNOWN_KIND", "message": message}})),
            )
                .into_response()
        }
    };

    // Unparseable JSON is reported by the validator as a non-object body.
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match screen(&core, kind, addr.ip(), &body) {
        Ok(sanitized) => Json(json!({
            "kind": kind,
            "data": sanitized,
        }))
        .into_response(),
        Err(response) => response,
    }
}

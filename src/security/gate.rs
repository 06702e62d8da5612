//! Request gate: per-kind throttling, body validation, request accounting.
//!
//! # Data Flow
//! ```text
//! POST /api/{kind}
//!     → request_metrics_middleware (timing, success/failure)
//!     → screen()
//!         → compute limit ("compute:{ip}") for expensive kinds
//!         → validate_request_body()
//!         → 400 VALIDATION_ERROR with every error, or sanitized fields
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::lifecycle::ResilienceCore;
use crate::observability::{metrics, SecurityEvent};
use crate::security::rate_limit::rate_limited_response;
use crate::security::validation::{validate_request_body, RequestKind};

/// 400 response carrying every validation error.
pub fn validation_error_response(details: Vec<String>) -> Response {
    let body = json!({
        "error": {
            "code": "VALIDATION_ERROR",
            "message": "Invalid request data",
            "details": details,
        }
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Run the gate for one request body.
///
/// Returns the sanitized fields on success, or the response to send back.
pub fn screen(
    core: &ResilienceCore,
    kind: RequestKind,
    client: IpAddr,
    body: &Value,
) -> Result<Map<String, Value>, Response> {
    let limits = &core.config.rate_limit;
    if limits.enabled && kind.is_compute_intensive() {
        let key = format!("compute:{}", client);
        if !core
            .limiter
            .check_rate_limit(&key, limits.compute_limit, limits.compute_window())
        {
            tracing::warn!(client = %client, kind = %kind, "Compute rate limit exceeded");
            metrics::record_rate_limited("compute");
            core.metrics.record_security_event(SecurityEvent::Blocked);
            return Err(rate_limited_response(
                "Too many compute-intensive requests, please try again later",
                limits.compute_window(),
            ));
        }
    }

    let outcome = validate_request_body(body, kind);
    if outcome.suspicious {
        tracing::warn!(client = %client, kind = %kind, "Suspicious input detected");
        core.metrics.record_security_event(SecurityEvent::Suspicious);
    }
    if !outcome.is_valid {
        tracing::debug!(client = %client, kind = %kind, errors = ?outcome.errors, "Request rejected by validation");
        return Err(validation_error_response(outcome.errors));
    }
    Ok(outcome.sanitized)
}

/// Record every response into the recorder.
///
/// `success` is any status below 400; 429 also counts as rate limited.
pub async fn request_metrics_middleware(
    State(core): State<Arc<ResilienceCore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status();

    core.metrics.record_request(
        status.as_u16() < 400,
        start.elapsed().as_millis() as u64,
        status == StatusCode::TOO_MANY_REQUESTS,
    );
    response
}

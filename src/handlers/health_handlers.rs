//! Health, readiness and documentation handlers.
//!
//! - GET /health -> liveness plus the running version
//! - GET /readyz -> readiness that checks PostgreSQL and Redis
//! - GET /docs   -> static HTML description of the API surface

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::state::AppState;

/// `GET /health`
///
/// Cheap liveness probe; never performs I/O.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs `SELECT 1` against PostgreSQL.
/// 2. Round-trips a PING against Redis.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let postgres_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let redis_check = match state.locks.ping().await {
        Ok(()) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let postgres_ok = postgres_check.0;
    let redis_ok = redis_check.0;
    let overall_ok = postgres_ok && redis_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "postgres",
        CheckStatus {
            ok: postgres_ok,
            error: postgres_check.1,
        },
    );
    checks.insert(
        "redis",
        CheckStatus {
            ok: redis_ok,
            error: redis_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// `GET /docs`
pub async fn docs() -> impl IntoResponse {
    Html(include_str!("../../static/docs.html"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

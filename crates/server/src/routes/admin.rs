use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use service::commands::has_http_scheme;
use service::MetricsSnapshot;

use crate::errors::JsonApiError;
use crate::routes::ServerState;

#[derive(Serialize, Deserialize, Debug)]
pub struct PutPostInput {
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StatsOutput {
    #[serde(flatten)]
    pub requests: MetricsSnapshot,
    pub cached_links: usize,
}

/// Create or replace the link for one post.
pub async fn put_post(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(payload): Json<PutPostInput>,
) -> Result<Json<serde_json::Value>, JsonApiError> {
    let svc = &state.commands;
    let _timer = svc.metrics().measure("add_link");
    if !has_http_scheme(&payload.url) {
        return Err(JsonApiError::bad_request("url must start with http:// or https://"));
    }
    svc.cache().put(&key, &payload.url).await?;
    info!(%key, "link defined via admin api");
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn stats(State(state): State<ServerState>) -> Json<StatsOutput> {
    let svc = &state.commands;
    Json(StatsOutput {
        requests: svc.metrics().snapshot(),
        cached_links: svc.cache().len().await,
    })
}

/// Middleware: require the configured `X-Admin-Token` (or query `admin_token`)
pub async fn require_admin_token(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token.as_deref() else {
        warn!("admin route called but no admin token is configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let key_from_header = req
        .headers()
        .get("X-Admin-Token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let key = if let Some(k) = key_from_header {
        Some(k)
    } else {
        // fallback to query param
        req.uri()
            .query()
            .and_then(|q| {
                q.split('&').find_map(|pair| {
                    let mut it = pair.splitn(2, '=');
                    match (it.next(), it.next()) {
                        (Some("admin_token"), Some(v)) => Some(v.to_string()),
                        _ => None,
                    }
                })
            })
    };

    match key {
        Some(k) if !k.trim().is_empty() && tokens_match(&k, expected) => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret-token", "s3cret-token"));
        assert!(!tokens_match("s3cret-tokeN", "s3cret-token"));
        assert!(!tokens_match("x3cret-token", "s3cret-token"));
        assert!(!tokens_match("s3cret", "s3cret-token"));
        assert!(!tokens_match("", "s3cret-token"));
    }
}

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::{observability, CommandService};

pub mod admin;
pub mod commands;
pub mod posts;

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    pub commands: CommandService,
    /// Token accepted by the `/admin` routes; `None` disables them.
    pub admin_token: Option<Arc<str>>,
}

impl ServerState {
    pub fn new(commands: CommandService, admin_token: Option<String>) -> Self {
        Self { commands, admin_token: admin_token.map(Arc::from) }
    }
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (axum::http::StatusCode, String) {
    observability::encode_metrics()
}

/// Build the full application router, including public and admin routes
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    // Public routes: health, prometheus, chat commands and link lookups
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/command", post(commands::handle_command))
        .route("/api/posts/:key", get(posts::get_post));

    // Admin routes
    let admin_routes = Router::new()
        .route("/admin/posts/:key", put(admin::put_post))
        .route("/admin/stats", get(admin::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin_token,
        ));

    public
        .merge(admin_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::DEBUG),
                )
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                // 5xx responses are logged at ERROR
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}

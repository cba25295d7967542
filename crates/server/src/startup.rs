use std::{net::SocketAddr, path::Path};

use axum::Router;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::routes::{self, ServerState};
use service::{runtime, CommandService, KeyFormat, LinkCache, RequestMetrics};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load the config file when present, otherwise defaults plus environment
pub fn load_config() -> anyhow::Result<AppConfig> {
    load_config_from(&configs::config_path())
}

/// Only a missing file falls back; a file that fails to parse or validate is returned as an error.
pub fn load_config_from(path: &str) -> anyhow::Result<AppConfig> {
    match configs::load_file_if_present(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            info!(path, "no config file; using defaults and environment");
            AppConfig::from_env()
        }
    }
}

/// Wire cache, metrics and command service from configuration. No I/O.
pub fn build_state(cfg: &AppConfig) -> ServerState {
    let cache = LinkCache::open(&cfg.links.file, KeyFormat::new(cfg.links.key_width));
    let metrics = RequestMetrics::new(cfg.metrics.latency_window);
    let commands = CommandService::new(
        cache,
        metrics,
        cfg.bot.admin_ids.iter().copied(),
        cfg.bot.command_prefix.clone(),
    );
    ServerState::new(commands, cfg.bot.admin_token.clone())
}

pub fn build_app(state: ServerState) -> Router {
    routes::build_router(state, build_cors())
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg);
    runtime::prepare_cache(Path::new(&cfg.links.file), state.commands.cache()).await?;
    if cfg.bot.admin_ids.is_empty() {
        warn!("no admin ids configured; /addlink and /stats are disabled for chat users");
    }

    let app = build_app(state);

    // Bind and serve
    let addr = bind_addr(&cfg)?;
    info!(%addr, links_file = %cfg.links.file, "starting postlink server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use configs::AppConfig;
use tower::ServiceExt;
use uuid::Uuid;

use server::startup::{build_app, build_state};

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.links.file = std::env::temp_dir()
        .join(format!("postlink_router_{}.json", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    cfg
}

#[tokio::test]
async fn admin_routes_locked_without_configured_token() -> anyhow::Result<()> {
    let app = build_app(build_state(&config()));
    let req = Request::builder()
        .method("PUT")
        .uri("/admin/posts/0001")
        .header("content-type", "application/json")
        .header("X-Admin-Token", "anything")
        .body(Body::from(r#"{"url":"https://x/1"}"#))?;
    let res = app.oneshot(req).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_route_answers() -> anyhow::Result<()> {
    let app = build_app(build_state(&config()));
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn command_route_rejects_malformed_body() -> anyhow::Result<()> {
    let app = build_app(build_state(&config()));
    let req = Request::builder()
        .method("POST")
        .uri("/command")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"text":"/start"}"#))?;
    let res = app.oneshot(req).await?;
    assert!(res.status().is_client_error());
    Ok(())
}

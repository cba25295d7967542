use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use service::ServiceError;

use crate::errors::JsonApiError;
use crate::routes::ServerState;

#[derive(Serialize, Deserialize, Debug)]
pub struct PostLink {
    pub key: String,
    pub url: String,
}

/// Public read path: look one post up through the cache.
pub async fn get_post(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> Result<Json<PostLink>, JsonApiError> {
    let svc = &state.commands;
    let _timer = svc.metrics().measure("get_post");
    let format = svc.cache().key_format();
    if !format.is_valid(&key) {
        return Err(JsonApiError::bad_request(format!(
            "post number must be {} digits (e.g., {})",
            format.width(),
            format.format(1)
        )));
    }
    match svc.cache().get(&key).await {
        Some(url) => Ok(Json(PostLink { key, url })),
        None => Err(ServiceError::not_found(&format!("post {key}")).into()),
    }
}

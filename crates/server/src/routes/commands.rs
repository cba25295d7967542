use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::routes::ServerState;

/// One chat message as forwarded by the chat transport.
#[derive(Serialize, Deserialize, Debug)]
pub struct CommandInput {
    pub user_id: i64,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CommandReply {
    pub reply: String,
}

pub async fn handle_command(
    State(state): State<ServerState>,
    Json(input): Json<CommandInput>,
) -> Json<CommandReply> {
    let reply = state.commands.handle(input.user_id, &input.text).await;
    Json(CommandReply { reply })
}

use axum::{http::StatusCode, response::IntoResponse, Extension, Json};

use crate::context::ActorContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(actor): Extension<ActorContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "actor_id": actor.actor().to_string(),
    }))
}

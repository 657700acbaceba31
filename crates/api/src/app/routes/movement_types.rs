use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_movement_types))
}

/// Subtypes offered for a scope and direction, in table order.
pub async fn list_movement_types(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::MovementTypesQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let subtypes = services.registry().subtypes_for(query.scope, query.direction);
    Json(serde_json::json!({
        "scope": query.scope,
        "direction": query.direction,
        "subtypes": subtypes,
    }))
    .into_response()
}

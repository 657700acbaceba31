use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use almox_inventory::{Material, WarehouseScope};

use crate::app::services::{self, AppServices};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_low_stock))
        .route("/stream", get(stream))
}

/// `{count, materials}` for one scope, or across all scopes when none is given.
pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ScopeQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    if let Some(scope) = query.scope {
        return match services.low_stock().summary(scope) {
            Ok(summary) => Json(summary).into_response(),
            Err(e) => errors::store_error_to_response(e),
        };
    }

    let mut materials: Vec<Material> = Vec::new();
    for scope in WarehouseScope::all() {
        match services.low_stock().list(scope) {
            Ok(list) => materials.extend(list),
            Err(e) => return errors::store_error_to_response(e),
        }
    }
    Json(serde_json::json!({
        "count": materials.len(),
        "materials": materials,
    }))
    .into_response()
}

/// Server-sent low-stock flips, optionally narrowed to one scope.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ScopeQuery>, QueryRejection>,
) -> axum::response::Response {
    match dto::query_params(query) {
        Ok(query) => services::low_stock_sse_stream(services, query.scope).into_response(),
        Err(resp) => resp,
    }
}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use almox_infra::{EntryRequest, MovementFilter};
use almox_inventory::MovementRecord;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_movements))
        .route("/entries", post(commit_entry))
        .route("/exits", post(commit_exit))
}

pub async fn commit_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<EntryRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().commit_entry(request, actor.actor()) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn commit_exit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::ExitBatchRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match dto::json_body(body) {
        Ok(v) => v.into_exit_request(),
        Err(resp) => return resp,
    };

    match services.engine().commit_exit(request, actor.actor()) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Ledger records in commit order.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<MovementFilter>, QueryRejection>,
) -> axum::response::Response {
    let filter = match dto::query_params(query) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let records = match services
        .ledger()
        .query(filter)
        .iter()
        .collect::<Result<Vec<MovementRecord>, _>>()
    {
        Ok(r) => r,
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(serde_json::json!({
        "count": records.len(),
        "records": records,
    }))
    .into_response()
}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use almox_inventory::{Material, MaterialPatch, NewMaterial, WarehouseScope};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_material).get(list_materials))
        .route("/:id", get(get_material).patch(update_material))
        .route("/:id/deactivate", post(deactivate_material))
}

pub async fn register_material(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewMaterial>, JsonRejection>,
) -> axum::response::Response {
    let input = match dto::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog().register(input) {
        Ok(material) => (StatusCode::CREATED, Json(material)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ScopeQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match dto::query_params(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let scopes = match query.scope {
        Some(scope) => vec![scope],
        None => WarehouseScope::all(),
    };

    let catalog = services.catalog();
    let mut materials: Vec<Material> = Vec::new();
    for scope in scopes {
        match catalog.list(scope) {
            Ok(list) => materials.extend(list),
            Err(e) => return errors::engine_error_to_response(e),
        }
    }

    Json(serde_json::json!({
        "count": materials.len(),
        "materials": materials,
    }))
    .into_response()
}

pub async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_material_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.catalog().get(id) {
        Ok(material) => Json(material).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Catalog edit. The patch type has no stock field and rejects unknown keys,
/// so `current_quantity` in the body is a 400.
pub async fn update_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<MaterialPatch>, JsonRejection>,
) -> axum::response::Response {
    let id = match dto::parse_material_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let patch = match dto::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog().update(id, &patch) {
        Ok(material) => Json(material).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn deactivate_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_material_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.catalog().deactivate(id) {
        Ok(material) => Json(material).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

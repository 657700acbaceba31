use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};

use almox_infra::{BasketError, EngineError, StoreError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        EngineError::Validation(fields) => json_error_with(
            StatusCode::BAD_REQUEST,
            "validation_error",
            message,
            "fields",
            json!(fields),
        ),
        EngineError::InsufficientStock { shortages } => json_error_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            message,
            "shortages",
            json!(shortages),
        ),
        EngineError::CrossScopeBatch { scopes } => json_error_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "cross_scope_batch",
            message,
            "scopes",
            json!(scopes),
        ),
        EngineError::ConcurrentModification { attempts } => json_error_with(
            StatusCode::SERVICE_UNAVAILABLE,
            "concurrent_modification",
            message,
            "attempts",
            json!(attempts),
        ),
        EngineError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        EngineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Store(e) => store_error_to_response(e),
    }
}

pub fn basket_error_to_response(err: BasketError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        BasketError::UnknownMaterial(_) | BasketError::NoSuchItem { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        BasketError::Inactive(_) | BasketError::NonPositiveQuantity | BasketError::Empty => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        BasketError::ScopeMismatch { basket, found, .. } => json_error_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "cross_scope_batch",
            message,
            "scopes",
            json!([basket, found]),
        ),
        BasketError::ExceedsAvailable {
            material_id,
            requested,
            available,
        } => json_error_with(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            message,
            "shortages",
            json!([{
                "material_id": material_id,
                "requested": requested,
                "available": available,
            }]),
        ),
        BasketError::Store(e) => store_error_to_response(e),
        BasketError::Engine(e) => engine_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    let message: String = message.into();
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
        })),
    )
        .into_response()
}

/// Like [`json_error`], with one extra structured field.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    key: &'static str,
    detail: Value,
) -> axum::response::Response {
    let message: String = message.into();
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
            key: detail,
        })),
    )
        .into_response()
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

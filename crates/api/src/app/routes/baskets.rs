//! Exit basket sessions: stage items with an advisory stock check, then
//! commit them as one exit batch.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use uuid::Uuid;

use crate::app::services::{AppServices, BasketSession};
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_basket))
        .route("/:id", axum::routing::get(get_basket).delete(close_basket))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:index", delete(remove_item))
        .route("/:id/commit", post(commit_basket))
}

pub async fn open_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let id = match services.baskets().open(actor.actor()) {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "basket open failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                e.to_string(),
            );
        }
    };
    tracing::debug!(basket_id = %id, actor = %actor.actor(), "basket opened");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "scope": null, "items": [] })),
    )
        .into_response()
}

pub async fn get_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    with_session(&services, &actor, &id, |id, session| {
        Json(dto::BasketView::new(id, &session.basket)).into_response()
    })
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::BasketItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = services.engine().store();
    with_session(&services, &actor, &id, |id, session| {
        if let Err(e) = session.basket.add(store, body.material_id, body.quantity) {
            return errors::basket_error_to_response(e);
        }
        (StatusCode::CREATED, Json(dto::BasketView::new(id, &session.basket))).into_response()
    })
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, index)): Path<(String, usize)>,
) -> axum::response::Response {
    with_session(&services, &actor, &id, |id, session| {
        if let Err(e) = session.basket.remove(index) {
            return errors::basket_error_to_response(e);
        }
        Json(dto::BasketView::new(id, &session.basket)).into_response()
    })
}

pub async fn commit_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::BasketCommitRequest>, JsonRejection>,
) -> axum::response::Response {
    let (subtype, fields) = match dto::json_body(body) {
        Ok(v) => v.into_parts(),
        Err(resp) => return resp,
    };

    let mut committed = None;
    let resp = with_session(&services, &actor, &id, |id, session| {
        match session
            .basket
            .commit(services.engine(), actor.actor(), subtype, fields)
        {
            Ok(receipt) => {
                committed = Some(id);
                (StatusCode::CREATED, Json(receipt)).into_response()
            }
            Err(e) => errors::basket_error_to_response(e),
        }
    });

    // A committed basket is spent; a rejected one stays open for retry.
    if let Some(id) = committed {
        services.baskets().close(id, actor.actor());
    }
    resp
}

pub async fn close_basket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_basket_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if services.baskets().close(id, actor.actor()) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        errors::not_found("basket")
    }
}

/// Run `f` against the caller's session. Sessions owned by someone else are
/// reported as missing.
fn with_session(
    services: &AppServices,
    actor: &ActorContext,
    raw_id: &str,
    f: impl FnOnce(Uuid, &mut BasketSession) -> axum::response::Response,
) -> axum::response::Response {
    let id = match dto::parse_basket_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let session: Arc<Mutex<BasketSession>> = match services.baskets().get(id, actor.actor()) {
        Some(s) => s,
        None => return errors::not_found("basket"),
    };
    let mut guard = match session.lock() {
        Ok(g) => g,
        Err(_) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "basket session unavailable",
            )
        }
    };
    f(id, &mut guard)
}

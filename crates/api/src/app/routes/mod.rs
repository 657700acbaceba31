use axum::Router;

pub mod baskets;
pub mod low_stock;
pub mod materials;
pub mod movement_types;
pub mod movements;
pub mod system;

/// Router for every endpoint that acts on behalf of a user.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", axum::routing::get(system::whoami))
        .nest("/materials", materials::router())
        .nest("/movement-types", movement_types::router())
        .nest("/movements", movements::router())
        .nest("/low-stock", low_stock::router())
        .nest("/baskets", baskets::router())
}

pub mod admin;
pub mod nodes;
pub mod users;

use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middlewares::admin::admin_auth;
use admin::admin_routes;
use nodes::node_routes;
use users::user_routes;

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub fn create_router(state: AppState) -> Router {
    let protected = admin_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        admin_auth,
    ));

    Router::new()
        .route("/health", get(health))
        .merge(node_routes())
        .merge(user_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

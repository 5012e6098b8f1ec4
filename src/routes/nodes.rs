use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::Node;

async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(state.store.list_nodes().await?))
}

async fn get_node(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Node>> {
    state
        .store
        .find_node(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Node"))
}

pub fn node_routes() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/:id", get(get_node))
}

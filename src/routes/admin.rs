//! Routes behind the `x-admin-key` check. Debug routes live here too since
//! they mutate payment state.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{Node, NodePatch, User, UserPatch};
use crate::reconciler::PaymentStatusReport;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    machine_id: Option<String>,
    patch: Option<UserPatch>,
}

async fn update_user(
    State(state): State<AppState>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(req) = payload?;
    let (Some(machine_id), Some(patch)) = (non_blank(req.machine_id), req.patch) else {
        return Err(ApiError::BadRequest("machineId and patch are required".into()));
    };
    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch must set at least one field".into()));
    }

    let user = state.reconciler.apply_patch(&machine_id, &patch).await?;

    info!(machine_id = %machine_id, ?patch, "admin updated user");
    Ok(Json(user))
}

#[derive(Deserialize)]
struct UpdateNodeRequest {
    id: Option<String>,
    patch: Option<NodePatch>,
}

async fn update_node(
    State(state): State<AppState>,
    payload: Result<Json<UpdateNodeRequest>, JsonRejection>,
) -> ApiResult<Json<Node>> {
    let Json(req) = payload?;
    let (Some(id), Some(patch)) = (non_blank(req.id), req.patch) else {
        return Err(ApiError::BadRequest("id and patch are required".into()));
    };
    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch must set at least one field".into()));
    }

    let node = state
        .store
        .update_node(&id, &patch)
        .await?
        .ok_or(ApiError::NotFound("Node"))?;

    info!(node_id = %id, ?patch, "admin updated node");
    Ok(Json(node))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.store.list_machine_ids().await?))
}

async fn payment_status(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
) -> ApiResult<Json<PaymentStatusReport>> {
    Ok(Json(state.reconciler.payment_status(&machine_id).await?))
}

async fn reset_payment(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.reconciler.reset_payment(&machine_id).await?))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users/update", post(update_user))
        .route("/admin/nodes/update", post(update_node))
        .route("/admin/users/list", get(list_users))
        .route(
            "/api/debug/users/:machine_id/payment-status",
            get(payment_status),
        )
        .route("/api/debug/users/:machine_id/reset-payment", put(reset_payment))
}

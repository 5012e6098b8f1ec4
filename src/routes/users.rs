use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::reconciler::Registration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    success: bool,
    machine_id: String,
}

async fn upsert_user(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> ApiResult<Json<UpsertResponse>> {
    let Json(registration) = payload?;
    let user = state.reconciler.reconcile(registration).await?;

    Ok(Json(UpsertResponse {
        success: true,
        machine_id: user.machine_id,
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
) -> ApiResult<Json<User>> {
    state
        .store
        .find_user(&machine_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPaymentRequest {
    machine_id: Option<String>,
    session_id: Option<String>,
}

async fn confirm_payment(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(req) = payload?;
    let user = state
        .reconciler
        .confirm_payment(req.machine_id, req.session_id)
        .await?;
    Ok(Json(user))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/upsert", post(upsert_user))
        .route("/api/users/upsert", post(upsert_user))
        .route("/users/confirm-payment", post(confirm_payment))
        .route("/users/:machine_id", get(get_user))
}

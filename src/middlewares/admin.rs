use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub async fn admin_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if !bool::from(provided.ct_eq(state.admin_key.as_bytes())) {
        warn!(path = %req.uri().path(), "rejected admin request");
        return ApiError::Unauthorized.into_response();
    }

    next.run(req).await
}

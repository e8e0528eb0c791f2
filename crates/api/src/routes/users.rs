//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{LoginResponse, Registered, Registration};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct ValidateAdminResponse {
    pub is_admin: bool,
}

/// POST /users: registers a customer and creates their cart.
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let registered = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// POST /login: exchanges credentials for a session token.
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let response = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(response))
}

/// POST /logout: revokes the presented token.
pub async fn logout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&principal.token).await?;
    tracing::info!(user_id = %principal.user.id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /validate_admin
pub async fn validate_admin(principal: Principal) -> Json<ValidateAdminResponse> {
    Json(ValidateAdminResponse {
        is_admin: principal.user.is_admin,
    })
}

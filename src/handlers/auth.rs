use axum::{extract::State, response::Json};

use crate::{
    auth::{LoginRequest, TokenResponse},
    errors::ServiceError,
    AppState,
};

#[utoipa::path(
    post,
    path = "/auth/login",
    summary = "Administrator login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    let token = state.auth.login(&request)?;
    Ok(Json(token))
}

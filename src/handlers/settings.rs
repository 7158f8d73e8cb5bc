use axum::{extract::State, response::Json};

use crate::{
    auth::AdminUser, entities::settings, services::settings::SettingsPatch, ApiResponse,
    ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "Read store settings",
    responses(
        (status = 200, description = "Current settings", body = ApiResponse<settings::Model>),
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<settings::Model> {
    let current = state.services.settings.get_settings().await?;
    Ok(Json(ApiResponse::success(current)))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings",
    summary = "Update store settings",
    description = "Only the fields present are changed; `null` clears an optional field",
    request_body = SettingsPatch,
    responses(
        (status = 200, description = "Updated settings", body = ApiResponse<settings::Model>),
        (status = 400, description = "Invalid values", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<settings::Model> {
    let updated = state.services.settings.update_settings(patch).await?;
    Ok(Json(ApiResponse::success(updated)))
}

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::size,
    services::catalog::{ProductFilter, ProductView},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    description = "Catalog products with their linked sizes, ordered by SKU",
    params(ProductFilter),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<Vec<ProductView>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Vec<ProductView>> {
    let products = state.services.catalog.list_products(filter).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/active",
    summary = "Activate or deactivate a product",
    description = "Products are never deleted; deactivated products cannot be ordered",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductView>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn set_product_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> ApiResult<ProductView> {
    let product = state
        .services
        .catalog
        .set_product_active(id, body.active)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    get,
    path = "/api/v1/sizes",
    summary = "List sizes",
    responses(
        (status = 200, description = "The size scale in display order", body = ApiResponse<Vec<size::Model>>),
    ),
    tag = "catalog"
)]
pub async fn list_sizes(State(state): State<AppState>) -> ApiResult<Vec<size::Model>> {
    let sizes = state.services.catalog.list_sizes().await?;
    Ok(Json(ApiResponse::success(sizes)))
}

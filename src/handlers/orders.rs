use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

use crate::{
    auth::AdminUser,
    documents::{document_filename, table_filename, DOCUMENT_CONTENT_TYPE, TABLE_CONTENT_TYPE},
    errors::ServiceError,
    services::orders::{
        CreateOrderOutcome, CreateOrderRequest, OrderDetails, OrderFilter, OrderListResponse,
    },
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Submit order",
    description = "Prices every line from the catalog and stores the order. Document or notification problems are reported as warnings; the order still stands.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderOutcome>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid contact details or empty order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unavailable product or below minimum order", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOrderOutcome>>), ServiceError> {
    let outcome = state.services.orders.create_order(request).await?;
    let response = if outcome.warnings.is_empty() {
        ApiResponse::success(outcome)
    } else {
        ApiResponse::with_message(
            outcome,
            "Order received; confirmation delivery may be delayed",
        )
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Newest first, optionally filtered by buyer email",
    params(OrderFilter),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<OrderListResponse> {
    let orders = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = String, Path, description = "Order ID or order number")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderDetails>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<OrderDetails> {
    let details = state.services.orders.get_order(&id).await?;
    Ok(Json(ApiResponse::success(details)))
}

fn attachment(content_type: &'static str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/document",
    summary = "Printable order document",
    params(("id" = String, Path, description = "Order ID or order number")),
    responses(
        (status = 200, description = "A4 PDF order sheet", content_type = "application/pdf"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let (details, body) = state.services.orders.order_document(&id).await?;
    Ok(attachment(
        DOCUMENT_CONTENT_TYPE,
        document_filename(&details.order.order_number),
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/export.csv",
    summary = "Order export",
    params(("id" = String, Path, description = "Order ID or order number")),
    responses(
        (status = 200, description = "CSV with BOM, one row per item plus totals", content_type = "text/csv"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn export_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let (details, body) = state.services.orders.order_table(&id).await?;
    Ok(attachment(
        TABLE_CONTENT_TYPE,
        table_filename(&details.order.order_number),
        body,
    ))
}

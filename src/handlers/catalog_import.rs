use axum::{
    extract::{Multipart, State},
    response::Json,
};
use tracing::info;

use crate::{
    auth::AdminUser,
    errors::ServiceError,
    services::catalog_import::{ImportReport, ImportRowsRequest, MappingOverride},
    ApiResponse, ApiResult, AppState,
};

fn report_message(report: &ImportReport) -> String {
    format!(
        "{} inserted, {} updated, {} failed",
        report.inserted,
        report.updated,
        report.errors.len()
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/catalog/import",
    summary = "Import catalog from a spreadsheet or CSV",
    description = "Multipart upload: `file` holds an xlsx/xls workbook (first sheet is read) or a CSV, first row headers; optional `mapping` holds a JSON column mapping override",
    request_body(content_type = "multipart/form-data", content = String),
    responses(
        (status = 200, description = "Import finished; row errors are listed in the report", body = ApiResponse<ImportReport>),
        (status = 400, description = "Missing, empty or unreadable file", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn import_file(
    State(state): State<AppState>,
    _admin: AdminUser,
    mut multipart: Multipart,
) -> ApiResult<ImportReport> {
    let mut file: Option<Vec<u8>> = None;
    let mut mapping: Option<MappingOverride> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::BadRequest(format!("failed to read file: {}", e)))?;
                file = Some(bytes.to_vec());
            }
            Some("mapping") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::BadRequest(format!("failed to read mapping: {}", e)))?;
                if !text.trim().is_empty() {
                    mapping = Some(serde_json::from_str(&text).map_err(|e| {
                        ServiceError::BadRequest(format!("invalid column mapping: {}", e))
                    })?);
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ServiceError::BadRequest("missing file field".into()))?;
    info!(bytes = file.len(), "Catalog file received");

    let report = state
        .services
        .catalog_import
        .import_file(&file, mapping)
        .await?;
    let message = report_message(&report);
    Ok(Json(ApiResponse::with_message(report, message)))
}

#[utoipa::path(
    post,
    path = "/api/v1/catalog/import/rows",
    summary = "Import catalog from JSON rows",
    description = "Rows are objects keyed by source header; cells may be strings, numbers or booleans",
    request_body = ImportRowsRequest,
    responses(
        (status = 200, description = "Import finished; row errors are listed in the report", body = ApiResponse<ImportReport>),
        (status = 400, description = "Empty input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn import_rows(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ImportRowsRequest>,
) -> ApiResult<ImportReport> {
    let report = state
        .services
        .catalog_import
        .import_rows(request.rows, request.mapping)
        .await?;
    let message = report_message(&report);
    Ok(Json(ApiResponse::with_message(report, message)))
}

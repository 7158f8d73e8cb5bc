use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wholesale API",
        version = "0.1.0",
        description = r#"
# Wholesale Ordering API

Backend for an apparel wholesale storefront.

## Features

- **Catalog**: products with per-size availability, imported from spreadsheets
- **Orders**: retailers submit size quantities; prices and VAT come from the catalog
- **Documents**: every order gets a printable sheet and a CSV export
- **Settings**: VAT rate, minimum order amount, notification address, terms

## Authentication

Administrative endpoints require a bearer token from `POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors share one shape:

```json
{
  "error": "Unprocessable Entity",
  "message": "minimum order amount is 1000.00; order total is 351.00",
  "request_id": "0d6c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "catalog", description = "Products, sizes and catalog import"),
        (name = "orders", description = "Order submission and review"),
        (name = "settings", description = "Store-wide settings"),
        (name = "auth", description = "Administrator login"),
        (name = "health", description = "Health check")
    ),
    paths(
        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::set_product_active,
        crate::handlers::products::list_sizes,
        crate::handlers::catalog_import::import_file,
        crate::handlers::catalog_import::import_rows,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_document,
        crate::handlers::orders::export_order,

        // Settings
        crate::handlers::settings::get_settings,
        crate::handlers::settings::update_settings,

        // Auth & health
        crate::handlers::auth::login,
        crate::handlers::health::health,
    ),
    components(
        schemas(
            crate::services::catalog::ProductView,
            crate::services::catalog_import::ImportReport,
            crate::services::catalog_import::RowError,
            crate::services::catalog_import::ImportRowsRequest,
            crate::services::catalog_import::MappingOverride,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::OrderLineRequest,
            crate::services::orders::OrderDetails,
            crate::services::orders::CreateOrderOutcome,
            crate::services::orders::OrderListResponse,
            crate::services::settings::SettingsPatch,
            crate::handlers::products::SetActiveRequest,
            crate::handlers::health::HealthResponse,
            crate::auth::LoginRequest,
            crate::auth::TokenResponse,
            crate::pricing::LineTotals,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

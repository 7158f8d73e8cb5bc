//! Wholesale ordering API
//!
//! Catalog import, VAT-aware order pricing, order documents and notifications
//! for an apparel wholesale storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cart;
pub mod config;
pub mod db;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod pricing;
pub mod services;
pub mod sizes;
pub mod storage;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    notifications::{LogNotifier, NotificationError, Notifier, RelayNotifier, SmtpNotifier},
    services::{
        catalog::CatalogService,
        catalog_import::CatalogImportService,
        dispatch::OrderDispatcher,
        orders::OrderService,
        settings::{SettingsDefaults, SettingsService},
    },
    storage::FileStorage,
};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub catalog_import: CatalogImportService,
    pub orders: OrderService,
    pub settings: SettingsService,
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    /// Wires every service from configuration, using `notifier` for order
    /// notifications.
    pub fn new(
        db: Arc<DbPool>,
        config: AppConfig,
        event_sender: Option<Arc<EventSender>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = SettingsService::new(
            db.clone(),
            event_sender.clone(),
            SettingsDefaults {
                vat_rate: config.default_vat_rate,
                business_email: config.default_business_email.clone(),
            },
        );
        let dispatcher = OrderDispatcher::new(
            FileStorage::new(&config.document_dir, &config.document_public_prefix),
            notifier,
        )
        .with_font(load_document_font(config.document_font_path.as_deref()));

        let services = AppServices {
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            catalog_import: CatalogImportService::new(
                db.clone(),
                event_sender.clone(),
                config.import_columns.clone(),
            ),
            orders: OrderService::new(db.clone(), event_sender, settings.clone(), dispatcher),
            settings,
        };

        Self {
            auth: Arc::new(AuthService::new(AuthConfig::from(&config))),
            db,
            config: Arc::new(config),
            services,
        }
    }
}

/// Reads the configured PDF font. A missing or unreadable font falls back to
/// the built-in one.
fn load_document_font(path: Option<&str>) -> Option<Arc<Vec<u8>>> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    match std::fs::read(path) {
        Ok(bytes) => Some(Arc::new(bytes)),
        Err(e) => {
            ::tracing::warn!(path, error = %e, "Document font unavailable, using built-in font");
            None
        }
    }
}

/// SMTP when a mail server is configured, else the HTTP relay when a relay URL
/// is, else a notifier that only logs.
pub fn notifier_from_config(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    if let Some(host) = config.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) {
        let credentials = config
            .smtp_username
            .clone()
            .zip(config.smtp_password.clone());
        return Ok(Arc::new(SmtpNotifier::new(
            host.trim(),
            config.smtp_port,
            credentials,
            &config.notification_from,
            config.notification_timeout(),
        )?));
    }

    match config.notification_relay_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(RelayNotifier::new(
            url,
            config.notification_from.clone(),
            config.notification_relay_secret.clone(),
            config.notification_timeout(),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes(max_upload_bytes: usize) -> Router<AppState> {
    let catalog = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route(
            "/products/:id/active",
            put(handlers::products::set_product_active),
        )
        .route("/sizes", get(handlers::products::list_sizes));

    let import = Router::new()
        .route("/catalog/import", post(handlers::catalog_import::import_file))
        .route(
            "/catalog/import/rows",
            post(handlers::catalog_import::import_rows),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let orders = Router::new()
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/document", get(handlers::orders::get_order_document))
        .route("/orders/:id/export.csv", get(handlers::orders::export_order))
        .route(
            "/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        );

    Router::new().merge(catalog).merge(import).merge(orders)
}

/// Full application router: health, auth, the v1 API and Swagger UI.
pub fn app_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/login", post(handlers::auth::login))
        .nest("/api/v1", api_v1_routes(max_upload_bytes))
        .merge(openapi::swagger_ui())
        .with_state(state)
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use wholesale_api::{
    app_router, auth,
    config::AppConfig,
    db::{self, DbPool},
    entities::{product, product_size},
    notifications::{Notification, NotificationError, Notifier},
    services::catalog::size_ids,
    sizes::Size,
    AppState,
};

pub const TEST_SECRET: &str = "q7Vn2Lr9Tx4Kb8Mz1Wc6Hs3Pd0Jf5Gy-wholesale-unit-test-secret-Ua7Ei2Oo9";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Always fails, as an unreachable mail server would.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn dispatch(&self, _notification: &Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Rejected(503))
    }
}

/// Application state over an in-memory SQLite database and a temporary
/// document directory.
pub struct TestApp {
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub notifier: Arc<RecordingNotifier>,
    pub documents: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_notifier(None).await
    }

    /// Uses `notifier` instead of the recording one for order dispatch.
    pub async fn with_notifier(notifier: Option<Arc<dyn Notifier>>) -> Self {
        let documents = tempfile::tempdir().expect("temp document dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection, otherwise each connection sees its own empty database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.document_dir = documents.path().to_string_lossy().into_owned();
        cfg.admin_email = Some(ADMIN_EMAIL.to_string());
        cfg.admin_password_hash = Some(auth::hash_password(ADMIN_PASSWORD).expect("hash"));

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let recording = Arc::new(RecordingNotifier::default());
        let notifier = notifier.unwrap_or_else(|| recording.clone() as Arc<dyn Notifier>);
        let state = AppState::new(db.clone(), cfg, None, notifier);

        Self {
            state,
            db,
            notifier: recording,
            documents,
        }
    }

    pub fn router(&self) -> Router {
        app_router(self.state.clone())
    }

    /// Inserts a product offered in `sizes`.
    pub async fn seed_product(
        &self,
        sku: &str,
        unit_price: Decimal,
        price_includes_vat: bool,
        sizes: &[Size],
    ) -> product::Model {
        let db = &*self.db;
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("{} dress", sku)),
            color: Set("Black".to_string()),
            unit_price: Set(unit_price),
            price_includes_vat: Set(price_includes_vat),
            size_set: Set("34-42".to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("insert product");

        let ids = size_ids(db).await.expect("size ids");
        let links: Vec<product_size::ActiveModel> = sizes
            .iter()
            .map(|size| product_size::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                size_id: Set(ids[size]),
            })
            .collect();
        if !links.is_empty() {
            product_size::Entity::insert_many(links)
                .exec(db)
                .await
                .expect("link sizes");
        }

        product
    }

    pub fn admin_token(&self) -> String {
        self.state
            .auth
            .issue_token(ADMIN_EMAIL)
            .expect("issue token")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router().oneshot(request).await.expect("route request");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a money value: {other}"),
    }
}

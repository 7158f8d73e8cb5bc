mod common;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
};
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;
use wholesale_api::sizes::Size;

use common::{money, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};

fn order_payload(product_id: uuid::Uuid) -> serde_json::Value {
    json!({
        "retailer_name": "Boutique Lev",
        "contact_name": "Dana Cohen",
        "phone": "050-123-4567",
        "email": "dana@example.com",
        "shipping_address": "12 Herzl St, Tel Aviv",
        "items": [
            { "product_id": product_id, "quantities": { "34": 1, "38": 2 } }
        ]
    })
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn admin_login_returns_bearer_token() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().expect("token").to_string();

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn admin_endpoints_require_token() {
    let app = TestApp::new().await;

    for (method, uri) in [
        (Method::GET, "/api/v1/orders"),
        (Method::POST, "/api/v1/catalog/import/rows"),
        (Method::PUT, "/api/v1/settings"),
    ] {
        let body = (method != Method::GET).then(|| json!({}));
        let (status, _) = app.request(method, uri, body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_is_public() {
    let app = TestApp::new().await;
    app.seed_product("WD-100", dec!(100), false, &[Size::S34]).await;

    let (status, body) = app.request(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["sizes"], json!(["34"]));

    let (status, body) = app.request(Method::GET, "/api/v1/sizes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn order_submission_round_trip() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("WD-100", dec!(100), false, &[Size::S34, Size::S38])
        .await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/orders", Some(order_payload(product.id)), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(money(&body["data"]["order"]["total"]).round_dp(2), dec!(351));
    assert_eq!(body["data"]["warnings"], json!([]));
    let number = body["data"]["order"]["order_number"]
        .as_str()
        .expect("order number")
        .to_string();

    let token = app.admin_token();
    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/orders/{}", number), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["sku"], "WD-100");

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/orders/{}/export.csv", number))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request");
    let response = app.router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(&format!("order-{}.csv", number)));
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("WD-100"));

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/orders/{}/document", number))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request");
    let response = app.router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn order_errors_map_to_status_codes() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-100", dec!(100), false, &[Size::S34]).await;

    // 38 is not offered for this product
    let (status, body) = app
        .request(Method::POST, "/api/v1/orders", Some(order_payload(product.id)), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap_or_default().contains("size 38"));

    let mut bad_contact = order_payload(product.id);
    bad_contact["email"] = json!("nope");
    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(bad_contact), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut unknown_size = order_payload(product.id);
    unknown_size["items"][0]["quantities"] = json!({ "44": 1 });
    let (status, _) = app
        .request(Method::POST, "/api/v1/orders", Some(unknown_size), None)
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn csv_upload_imports_catalog() {
    let app = TestApp::new().await;
    let token = app.admin_token();

    let boundary = "wholesale-boundary";
    let csv = "SKU,Name,Color,Price,Sizes\nE1,Coat,Grey,320,36-40\nE2,Coat,,320,36-40\n";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"catalog.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        csv = csv
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/catalog/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .expect("request");

    let response = app.router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["data"]["inserted"], 1);
    assert_eq!(json["data"]["errors"][0]["row"], 3);
    assert_eq!(json["message"], "1 inserted, 0 updated, 1 failed");
}

#[tokio::test]
async fn settings_can_be_read_and_updated() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/v1/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["data"]["vat_rate"]), dec!(0.17));
    assert!(body["data"].get("id").is_none());

    let token = app.admin_token();
    let (status, body) = app
        .request(
            Method::PUT,
            "/api/v1/settings",
            Some(json!({ "vat_rate": "0.18", "min_order_amount": "500", "business_email": "sales@example.com" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["data"]["vat_rate"]).round_dp(2), dec!(0.18));
    assert_eq!(body["data"]["business_email"], "sales@example.com");

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/v1/settings",
            Some(json!({ "min_order_amount": null })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["min_order_amount"].is_null());

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/settings",
            Some(json!({ "vat_rate": "1.5" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;
use wholesale_api::{
    entities::{order, order_item},
    errors::ServiceError,
    services::{
        orders::{CreateOrderRequest, OrderFilter, OrderLineRequest},
        settings::SettingsPatch,
    },
    sizes::{Size, SizeQuantities, MAX_SIZE_QUANTITY},
};

use common::{FailingNotifier, TestApp};

fn order_request(items: Vec<OrderLineRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        retailer_name: "Boutique Lev".into(),
        vat_number: Some("514000000".into()),
        contact_name: "Dana Cohen".into(),
        phone: "050-123-4567".into(),
        email: "dana@example.com".into(),
        shipping_address: "12 Herzl St, Tel Aviv".into(),
        notes: Some("Deliver before noon".into()),
        requested_date: None,
        items,
    }
}

fn line(product_id: Uuid, sizes: &[(Size, u32)]) -> OrderLineRequest {
    OrderLineRequest {
        product_id,
        quantities: sizes.iter().copied().collect(),
    }
}

async fn order_count(app: &TestApp) -> u64 {
    order::Entity::find().count(&*app.db).await.expect("count orders")
}

#[tokio::test]
async fn net_price_gets_vat_added() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("WD-100", dec!(100), false, &[Size::S34, Size::S36, Size::S38])
        .await;

    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(
            product.id,
            &[(Size::S34, 1), (Size::S38, 2)],
        )]))
        .await
        .expect("order created");

    let order = &outcome.details.order;
    assert_eq!(order.subtotal.round_dp(2), dec!(300));
    assert_eq!(order.vat.round_dp(2), dec!(51));
    assert_eq!(order.total.round_dp(2), dec!(351));
    assert!(order.order_number.starts_with("WO-"));
    assert!(outcome.warnings.is_empty());

    let items = &outcome.details.items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].sku, "WD-100");
    assert_eq!(items[0].quantities().get(Size::S38), 2);
    assert_eq!(items[0].quantities().total_quantity(), 3);
}

#[tokio::test]
async fn gross_price_is_split_into_net_and_vat() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-117", dec!(117), true, &[Size::S40]).await;

    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S40, 1)])]))
        .await
        .expect("order created");

    let order = &outcome.details.order;
    assert_eq!(order.subtotal.round_dp(2), dec!(100));
    assert_eq!(order.vat.round_dp(2), dec!(17));
    assert_eq!(order.total.round_dp(2), dec!(117));
}

#[tokio::test]
async fn order_writes_documents_and_notifies_business() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-200", dec!(80), false, &[Size::S36]).await;

    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S36, 4)])]))
        .await
        .expect("order created");

    let order = &outcome.details.order;
    let document = order.document_path.as_deref().expect("document path");
    let table = order.table_path.as_deref().expect("table path");
    assert!(document.starts_with("/orders/"));
    assert!(document.ends_with(".pdf"));
    assert!(table.ends_with(".csv"));

    let stored = app
        .documents
        .path()
        .join(format!("order-{}.pdf", order.order_number));
    assert!(std::fs::read(&stored).expect("stored document").starts_with(b"%PDF-"));

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["orders@example.com".to_string()]);
    assert_eq!(sent[0].cc, vec!["dana@example.com".to_string()]);
    assert!(sent[0].subject.contains(&order.order_number));
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].content_type, "application/pdf");
    assert_eq!(
        sent[0].attachments[0].filename,
        format!("order-{}.pdf", order.order_number)
    );
}

#[tokio::test]
async fn notifier_failure_keeps_the_order() {
    let app = TestApp::with_notifier(Some(Arc::new(FailingNotifier))).await;
    let product = app.seed_product("WD-300", dec!(50), false, &[Size::S42]).await;

    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S42, 2)])]))
        .await
        .expect("order still created");

    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(order_count(&app).await, 1);
    assert!(outcome.details.order.document_path.is_some());
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-400", dec!(50), false, &[Size::S34]).await;

    let no_lines = app
        .state
        .services
        .orders
        .create_order(order_request(vec![]))
        .await;
    assert_matches!(no_lines, Err(ServiceError::ValidationError(msg)) if msg == "order is empty");

    let all_zero = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S34, 0)])]))
        .await;
    assert_matches!(all_zero, Err(ServiceError::ValidationError(_)));
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn invalid_contact_details_are_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-410", dec!(50), false, &[Size::S34]).await;

    let mut request = order_request(vec![line(product.id, &[(Size::S34, 1)])]);
    request.phone = "12-34".into();
    request.email = "not-an-email".into();

    let result = app.state.services.orders.create_order(request).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn unknown_and_inactive_products_are_unavailable() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-500", dec!(50), false, &[Size::S34]).await;

    let unknown = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(Uuid::new_v4(), &[(Size::S34, 1)])]))
        .await;
    assert_matches!(unknown, Err(ServiceError::ProductUnavailable(_)));

    app.state
        .services
        .catalog
        .set_product_active(product.id, false)
        .await
        .expect("deactivate");

    let inactive = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S34, 1)])]))
        .await;
    assert_matches!(
        inactive,
        Err(ServiceError::ProductUnavailable(msg)) if msg.contains("WD-500")
    );
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn size_not_offered_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-600", dec!(50), false, &[Size::S34, Size::S36]).await;

    let result = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S42, 1)])]))
        .await;

    assert_matches!(
        result,
        Err(ServiceError::ProductUnavailable(msg)) if msg.contains("size 42")
    );
}

#[tokio::test]
async fn minimum_order_amount_is_enforced() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-700", dec!(100), false, &[Size::S38]).await;
    app.state
        .services
        .settings
        .update_settings(SettingsPatch {
            min_order_amount: Some(Some(dec!(1000))),
            ..Default::default()
        })
        .await
        .expect("set minimum");

    let result = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S38, 3)])]))
        .await;

    assert_matches!(
        result,
        Err(ServiceError::PolicyViolation(msg)) if msg.contains("1000.00") && msg.contains("351.00")
    );
    assert_eq!(order_count(&app).await, 0);

    let big = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S38, 9)])]))
        .await;
    assert!(big.is_ok());
}

#[tokio::test]
async fn duplicate_lines_for_one_product_are_merged() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-800", dec!(10), false, &[Size::S34, Size::S36]).await;

    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![
            line(product.id, &[(Size::S34, 1)]),
            line(product.id, &[(Size::S34, 2), (Size::S36, 1)]),
        ]))
        .await
        .expect("order created");

    assert_eq!(outcome.details.items.len(), 1);
    let quantities: SizeQuantities = outcome.details.items[0].quantities();
    assert_eq!(quantities.get(Size::S34), 3);
    assert_eq!(quantities.get(Size::S36), 1);
}

#[tokio::test]
async fn orders_can_be_listed_and_fetched() {
    let app = TestApp::new().await;
    let dress = app.seed_product("WD-900", dec!(20), false, &[Size::S34]).await;
    let skirt = app.seed_product("WS-100", dec!(30), false, &[Size::S36]).await;

    let first = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(dress.id, &[(Size::S34, 1)])]))
        .await
        .expect("first order");

    let mut other = order_request(vec![
        line(skirt.id, &[(Size::S36, 2)]),
        line(dress.id, &[(Size::S34, 1)]),
    ]);
    other.email = "noa@example.com".into();
    app.state
        .services
        .orders
        .create_order(other)
        .await
        .expect("second order");

    let all = app
        .state
        .services
        .orders
        .list_orders(OrderFilter::default())
        .await
        .expect("list");
    assert_eq!(all.total, 2);
    assert_eq!(all.page, 1);
    assert_eq!(all.per_page, 20);

    let filtered = app
        .state
        .services
        .orders
        .list_orders(OrderFilter {
            email: Some("noa@example.com".into()),
            ..Default::default()
        })
        .await
        .expect("filtered list");
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.orders[0].email, "noa@example.com");

    let by_number = app
        .state
        .services
        .orders
        .get_order(&first.details.order.order_number)
        .await
        .expect("by number");
    assert_eq!(by_number.order.id, first.details.order.id);

    let second_id = filtered.orders[0].id;
    let by_id = app
        .state
        .services
        .orders
        .get_order(&second_id.to_string())
        .await
        .expect("by id");
    let skus: Vec<&str> = by_id.items.iter().map(|i| i.sku.as_str()).collect();
    assert_eq!(skus, vec!["WS-100", "WD-900"]);

    let stored_items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(second_id))
        .count(&*app.db)
        .await
        .expect("count items");
    assert_eq!(stored_items, 2);

    let missing = app.state.services.orders.get_order("WO-19700101-DEADBEEF").await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn missing_document_file_is_regenerated() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-950", dec!(25), false, &[Size::S40]).await;
    let outcome = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S40, 2)])]))
        .await
        .expect("order created");
    let number = outcome.details.order.order_number.clone();

    std::fs::remove_file(app.documents.path().join(format!("order-{}.pdf", number)))
        .expect("remove stored document");

    let (details, bytes) = app
        .state
        .services
        .orders
        .order_document(&number)
        .await
        .expect("regenerated document");
    assert_eq!(details.order.order_number, number);
    assert!(bytes.starts_with(b"%PDF-"));

    let (_, table) = app
        .state
        .services
        .orders
        .order_table(&number)
        .await
        .expect("table");
    assert!(table.starts_with(&[0xEF, 0xBB, 0xBF]));
}

#[tokio::test]
async fn quantities_beyond_the_per_size_limit_are_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-960", dec!(1), false, &[Size::S34, Size::S36]).await;

    let huge = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(
            product.id,
            &[(Size::S34, 3_000_000_000), (Size::S36, 1)],
        )]))
        .await;
    assert_matches!(huge, Err(ServiceError::ValidationError(msg)) if msg.starts_with("items:"));

    // Each line is within the limit; merged they are not.
    let half = MAX_SIZE_QUANTITY / 2 + 1;
    let merged = app
        .state
        .services
        .orders
        .create_order(order_request(vec![
            line(product.id, &[(Size::S36, half)]),
            line(product.id, &[(Size::S36, half)]),
        ]))
        .await;
    assert_matches!(merged, Err(ServiceError::ValidationError(msg)) if msg.contains("size 36"));
    assert_eq!(order_count(&app).await, 0);

    let at_limit = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S34, MAX_SIZE_QUANTITY)])]))
        .await
        .expect("order at the limit");
    let item = &at_limit.details.items[0];
    assert_eq!(item.qty_34, MAX_SIZE_QUANTITY as i32);
    assert_eq!(item.line_subtotal.round_dp(2), dec!(100000));
}

#[tokio::test]
async fn failed_item_insert_leaves_no_order_behind() {
    let app = TestApp::new().await;
    let product = app.seed_product("WD-970", dec!(40), false, &[Size::S38]).await;

    app.db
        .execute_unprepared("DROP TABLE order_items")
        .await
        .expect("drop order_items");

    let result = app
        .state
        .services
        .orders
        .create_order(order_request(vec![line(product.id, &[(Size::S38, 2)])]))
        .await;

    assert_matches!(result, Err(ServiceError::DatabaseError(_)));
    assert_eq!(order_count(&app).await, 0);
    assert!(app.notifier.sent().is_empty());
}

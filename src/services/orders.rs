use crate::{
    cart::{Cart, CartLine},
    db::DbPool,
    documents::{document_filename, render_order_table, table_filename},
    entities::{
        order::{self, Entity as OrderEntity},
        order_item::{self, quantity_columns, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        settings,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{format_money, price_line, LineTotals, OrderTotals},
    services::{catalog::linked_sizes, dispatch::OrderDispatcher, settings::SettingsService},
    sizes::{Size, SizeQuantities, MAX_SIZE_QUANTITY},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

/// One product's size quantities in a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    /// Quantity per size token, e.g. `{"34": 2, "38": 1}`
    #[schema(value_type = Object, example = json!({"34": 2, "36": 0, "38": 1}))]
    pub quantities: SizeQuantities,
}

/// Order submission. Only product ids and quantities are taken from the
/// buyer; prices come from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub retailer_name: String,
    pub vat_number: Option<String>,
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub contact_name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 5, message = "must be at least 5 characters"))]
    pub shipping_address: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
    /// Requested delivery date (YYYY-MM-DD)
    #[schema(value_type = Option<String>, example = "2024-04-01")]
    pub requested_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(custom = "validate_line_quantities")]
    pub items: Vec<OrderLineRequest>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.chars().filter(|c| c.is_ascii_digit()).count() < 9 {
        let mut err = ValidationError::new("phone");
        err.message = Some("must contain at least 9 digits".into());
        return Err(err);
    }
    Ok(())
}

fn validate_line_quantities(items: &[OrderLineRequest]) -> Result<(), ValidationError> {
    if items
        .iter()
        .any(|line| line.quantities.exceeding(MAX_SIZE_QUANTITY).is_some())
    {
        let mut err = ValidationError::new("quantity");
        err.message = Some(format!("at most {} units per size", MAX_SIZE_QUANTITY).into());
        return Err(err);
    }
    Ok(())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// An order header with its items in position order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Result of a successful submission. Warnings describe post-commit steps
/// (documents, notification) that did not complete.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateOrderOutcome {
    #[serde(flatten)]
    pub details: OrderDetails,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    /// Exact buyer email
    pub email: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

struct PricedLine<'a> {
    product: &'a product::Model,
    quantities: SizeQuantities,
    totals: LineTotals,
}

fn order_number(id: Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!("WO-{}-{}", Utc::now().format("%Y%m%d"), suffix.to_uppercase())
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: SettingsService,
    dispatcher: OrderDispatcher,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        settings: SettingsService,
        dispatcher: OrderDispatcher,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
            dispatcher,
        }
    }

    /// Validates, prices and persists an order, then hands it to the
    /// dispatcher. Nothing after the commit can fail the order.
    #[instrument(skip(self, request), fields(email = %request.email, lines = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderOutcome, ServiceError> {
        request.validate()?;

        let cart = Cart::from_lines(request.items.iter().map(|line| CartLine {
            product_id: line.product_id,
            quantities: line.quantities,
        }));
        if cart.is_empty() {
            return Err(ServiceError::ValidationError("order is empty".into()));
        }
        // Merged duplicate lines can cross the bound even when each line is within it.
        if let Some((line, size)) = cart.lines().iter().find_map(|l| {
            l.quantities
                .exceeding(MAX_SIZE_QUANTITY)
                .map(|(size, _)| (l, size))
        }) {
            return Err(ServiceError::ValidationError(format!(
                "quantity for size {} of product {} exceeds {}",
                size, line.product_id, MAX_SIZE_QUANTITY
            )));
        }

        let settings = self.settings.get_settings().await?;
        let db = &*self.db_pool;

        let ids: Vec<Uuid> = cart.lines().iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load ordered products");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let offered = linked_sizes(db, &ids).await?;

        let mut lines = Vec::with_capacity(cart.len());
        let mut totals = OrderTotals::default();

        for line in cart.lines() {
            let product = match products.get(&line.product_id) {
                Some(p) if p.active => p,
                Some(p) => {
                    return Err(ServiceError::ProductUnavailable(format!(
                        "{} is no longer active",
                        p.sku
                    )))
                }
                None => {
                    return Err(ServiceError::ProductUnavailable(format!(
                        "product {} not found",
                        line.product_id
                    )))
                }
            };

            let sizes: Vec<Size> = offered
                .get(&product.id)
                .map(|rows| rows.iter().filter_map(|s| s.size()).collect())
                .unwrap_or_default();
            if let Some((size, _)) = line.quantities.non_zero().find(|(s, _)| !sizes.contains(s)) {
                return Err(ServiceError::ProductUnavailable(format!(
                    "{} is not offered in size {}",
                    product.sku, size
                )));
            }

            let line_totals = price_line(
                product.unit_price,
                line.quantities.total_quantity(),
                product.price_includes_vat,
                settings.vat_rate,
            );
            totals.add_line(&line_totals);
            lines.push(PricedLine {
                product,
                quantities: line.quantities,
                totals: line_totals,
            });
        }

        if let Some(min) = settings.min_order_amount {
            if totals.total < min {
                return Err(ServiceError::PolicyViolation(format!(
                    "minimum order amount is {}; order total is {}",
                    format_money(min),
                    format_money(totals.total)
                )));
            }
        }

        let details = self.persist(request, &lines, totals, &settings).await?;
        let order_id = details.order.id;

        info!(
            order_id = %order_id,
            order_number = %details.order.order_number,
            total = %details.order.total,
            "Order created"
        );

        let dispatched = self.dispatcher.dispatch(&details, &settings).await;
        let mut warnings = dispatched.warnings;
        let mut details = details;

        if dispatched.document_path.is_some() || dispatched.table_path.is_some() {
            let mut model = details.order.clone().into_active_model();
            model.document_path = Set(dispatched.document_path.clone());
            model.table_path = Set(dispatched.table_path.clone());
            match model.update(db).await {
                Ok(updated) => details.order = updated,
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Failed to attach document paths");
                    warnings.push("order documents could not be linked to the order".to_string());
                }
            }
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id,
                    order_number: details.order.order_number.clone(),
                    total: details.order.total,
                    item_count: details.items.len(),
                })
                .await;
        }

        Ok(CreateOrderOutcome { details, warnings })
    }

    /// Writes the header and every item in one transaction.
    async fn persist(
        &self,
        request: CreateOrderRequest,
        lines: &[PricedLine<'_>],
        totals: OrderTotals,
        settings: &settings::Model,
    ) -> Result<OrderDetails, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let items: Vec<order_item::Model> = lines
            .iter()
            .enumerate()
            .map(|(position, line)| {
                let [qty_34, qty_36, qty_38, qty_40, qty_42] = quantity_columns(&line.quantities)?;
                Ok(order_item::Model {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: line.product.id,
                    position: position as i32,
                    sku: line.product.sku.clone(),
                    name: line.product.name.clone(),
                    color: line.product.color.clone(),
                    unit_price: line.product.unit_price,
                    price_includes_vat: line.product.price_includes_vat,
                    qty_34,
                    qty_36,
                    qty_38,
                    qty_40,
                    qty_42,
                    line_subtotal: line.totals.subtotal,
                    line_vat: line.totals.vat,
                    line_total: line.totals.total,
                })
            })
            .collect::<Result<_, ServiceError>>()?;

        let header = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number(order_id)),
            retailer_name: Set(request.retailer_name.trim().to_string()),
            vat_number: Set(optional_text(request.vat_number)),
            contact_name: Set(request.contact_name.trim().to_string()),
            phone: Set(request.phone.trim().to_string()),
            email: Set(request.email.trim().to_string()),
            shipping_address: Set(request.shipping_address.trim().to_string()),
            notes: Set(optional_text(request.notes)),
            requested_date: Set(request.requested_date),
            subtotal: Set(totals.subtotal),
            vat: Set(totals.vat),
            total: Set(totals.total),
            vat_rate: Set(settings.vat_rate),
            document_path: Set(None),
            table_path: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start order transaction");
            ServiceError::DatabaseError(e)
        })?;

        let written: Result<order::Model, DbErr> = async {
            let order = header.insert(&txn).await?;
            OrderItemEntity::insert_many(items.iter().cloned().map(IntoActiveModel::into_active_model))
                .exec(&txn)
                .await?;
            Ok(order)
        }
        .await;

        let order = match written {
            Ok(order) => order,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Failed to write order");
                if let Err(rollback) = txn.rollback().await {
                    warn!(order_id = %order_id, error = %rollback, "Rollback of order failed");
                }
                return Err(ServiceError::DatabaseError(e));
            }
        };

        txn.commit().await.map_err(|e| {
            error!(order_id = %order_id, error = %e, "Failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderDetails { order, items })
    }

    /// Lists orders newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<OrderListResponse, ServiceError> {
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let mut query = OrderEntity::find();
        if let Some(email) = filter.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            query = query.filter(order::Column::Email.eq(email));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Finds an order by id or by order number.
    #[instrument(skip(self))]
    pub async fn get_order(&self, key: &str) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db_pool;
        let key = key.trim();

        let query = match Uuid::parse_str(key) {
            Ok(id) => OrderEntity::find_by_id(id),
            Err(_) => OrderEntity::find().filter(order::Column::OrderNumber.eq(key)),
        };
        let order = query
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", key)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderDetails { order, items })
    }

    /// The stored printable document, regenerated if the file is missing.
    pub async fn order_document(&self, key: &str) -> Result<(OrderDetails, Vec<u8>), ServiceError> {
        let details = self.get_order(key).await?;
        let filename = document_filename(&details.order.order_number);
        match self.dispatcher.storage().get(&filename).await {
            Ok(bytes) => Ok((details, bytes)),
            Err(_) => {
                let settings = self.settings.get_settings().await?;
                let bytes = self.dispatcher.render_document(&details, &settings)?;
                Ok((details, bytes))
            }
        }
    }

    /// The stored tabular export, regenerated if the file is missing.
    pub async fn order_table(&self, key: &str) -> Result<(OrderDetails, Vec<u8>), ServiceError> {
        let details = self.get_order(key).await?;
        let filename = table_filename(&details.order.order_number);
        match self.dispatcher.storage().get(&filename).await {
            Ok(bytes) => Ok((details, bytes)),
            Err(_) => {
                let bytes = render_order_table(&details)?;
                Ok((details, bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            retailer_name: "Boutique".into(),
            vat_number: None,
            contact_name: "Dana".into(),
            phone: "050-123-4567".into(),
            email: "dana@example.com".into(),
            shipping_address: "2 Allenby, Haifa".into(),
            notes: None,
            requested_date: None,
            items: vec![],
        }
    }

    #[test]
    fn contact_rules() {
        assert!(request().validate().is_ok());

        let mut short = request();
        short.retailer_name = "B".into();
        short.phone = "12-34".into();
        short.shipping_address = "x".into();
        let err: ServiceError = short.validate().unwrap_err().into();
        assert_matches!(err, ServiceError::ValidationError(msg) => {
            assert!(msg.contains("retailer_name"));
            assert!(msg.contains("phone: must contain at least 9 digits"));
            assert!(msg.contains("shipping_address"));
        });
    }

    #[test]
    fn per_size_quantities_are_bounded() {
        let mut huge = request();
        huge.items = vec![OrderLineRequest {
            product_id: Uuid::nil(),
            quantities: SizeQuantities::new()
                .with(Size::S34, u32::MAX)
                .with(Size::S36, 1),
        }];
        let err: ServiceError = huge.validate().unwrap_err().into();
        assert_matches!(err, ServiceError::ValidationError(msg) => {
            assert_eq!(msg, format!("items: at most {} units per size", MAX_SIZE_QUANTITY));
        });

        let mut at_limit = request();
        at_limit.items = vec![OrderLineRequest {
            product_id: Uuid::nil(),
            quantities: SizeQuantities::new().with(Size::S42, MAX_SIZE_QUANTITY),
        }];
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn order_numbers_are_dated_and_upper_hex() {
        let number = order_number(Uuid::new_v4());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts[0], "WO");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn request_parses_size_keyed_quantities() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "retailer_name": "Boutique",
            "contact_name": "Dana",
            "phone": "0501234567",
            "email": "dana@example.com",
            "shipping_address": "2 Allenby, Haifa",
            "requested_date": "2024-04-01",
            "items": [{"product_id": Uuid::nil(), "quantities": {"34": 2, "40": 1}}]
        }))
        .unwrap();
        assert_eq!(req.items[0].quantities.total_quantity(), 3);
        assert_eq!(req.requested_date, NaiveDate::from_ymd_opt(2024, 4, 1));
    }
}

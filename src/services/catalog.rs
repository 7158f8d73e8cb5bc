use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity},
        product_size::{self, Entity as ProductSizeEntity},
        size::{self, Entity as SizeEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    sizes::Size,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Filters for the product listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    /// Case-insensitive match against SKU or name
    pub search: Option<String>,
    /// Exact color
    pub color: Option<String>,
    /// Only orderable products (defaults to true)
    pub active_only: Option<bool>,
}

/// A product together with the sizes it is offered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub color: String,
    #[schema(value_type = String, example = "117.00")]
    pub unit_price: Decimal,
    pub price_includes_vat: bool,
    pub size_set: String,
    /// Linked size tokens in scale order
    #[schema(example = json!(["34", "36", "38"]))]
    pub sizes: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    fn new(product: product::Model, mut sizes: Vec<size::Model>) -> Self {
        sizes.sort_by_key(|s| s.sort_order);
        Self {
            id: product.id,
            sku: product.sku,
            name: product.name,
            color: product.color,
            unit_price: product.unit_price,
            price_includes_vat: product.price_includes_vat,
            size_set: product.size_set,
            sizes: sizes.into_iter().map(|s| s.name).collect(),
            active: product.active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Sizes linked to each of the given products.
pub async fn linked_sizes<C>(
    db: &C,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<size::Model>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut by_product: HashMap<Uuid, Vec<size::Model>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(by_product);
    }

    let links = ProductSizeEntity::find()
        .filter(product_size::Column::ProductId.is_in(product_ids.iter().copied()))
        .find_also_related(SizeEntity)
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load product sizes");
            ServiceError::DatabaseError(e)
        })?;

    for (link, size) in links {
        if let Some(size) = size {
            by_product.entry(link.product_id).or_default().push(size);
        }
    }
    Ok(by_product)
}

/// Read side of the catalog plus the manual activation toggle.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Vec<ProductView>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = ProductEntity::find();

        if filter.active_only.unwrap_or(true) {
            query = query.filter(product::Column::Active.eq(true));
        }

        if let Some(color) = filter.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            query = query.filter(product::Column::Color.eq(color));
        }

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            ProductEntity,
                            product::Column::Sku,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            ProductEntity,
                            product::Column::Name,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        let products = query
            .order_by_asc(product::Column::Sku)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list products");
                ServiceError::DatabaseError(e)
            })?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut sizes = linked_sizes(db, &ids).await?;

        Ok(products
            .into_iter()
            .map(|p| {
                let linked = sizes.remove(&p.id).unwrap_or_default();
                ProductView::new(p, linked)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        let db = &*self.db_pool;
        let product = ProductEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;
        let linked = linked_sizes(db, &[id]).await?.remove(&id).unwrap_or_default();
        Ok(ProductView::new(product, linked))
    }

    /// Deactivates or reactivates a product. Products are never deleted.
    #[instrument(skip(self))]
    pub async fn set_product_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<ProductView, ServiceError> {
        let db = &*self.db_pool;
        let product = ProductEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;

        let product = if product.active == active {
            product
        } else {
            let mut model = product.into_active_model();
            model.active = Set(active);
            let updated = model.update(db).await.map_err(|e| {
                error!(product_id = %id, error = %e, "Failed to toggle product");
                ServiceError::DatabaseError(e)
            })?;

            info!(product_id = %id, sku = %updated.sku, active, "Product activation changed");
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::ProductActivationChanged {
                        product_id: id,
                        sku: updated.sku.clone(),
                        active,
                    })
                    .await;
            }
            updated
        };

        let linked = linked_sizes(db, &[id]).await?.remove(&id).unwrap_or_default();
        Ok(ProductView::new(product, linked))
    }

    /// Looks up a product that can currently be ordered.
    pub async fn find_active_product(
        &self,
        id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        ProductEntity::find_by_id(id)
            .filter(product::Column::Active.eq(true))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_product_by_sku(
        &self,
        sku: &str,
    ) -> Result<Option<product::Model>, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::Sku.eq(sku.trim()))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// The size scale in display order.
    pub async fn list_sizes(&self) -> Result<Vec<size::Model>, ServiceError> {
        SizeEntity::find()
            .order_by_asc(size::Column::SortOrder)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Maps the seeded size rows to their ids.
pub async fn size_ids<C>(db: &C) -> Result<HashMap<Size, i32>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = SizeEntity::find()
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.size().map(|s| (s, row.id)))
        .collect())
}

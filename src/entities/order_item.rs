use crate::errors::ServiceError;
use crate::sizes::{Size, SizeQuantities};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One product line of an order, snapshotting the product as ordered.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "order_items")]
#[schema(as = OrderItem)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    /// Line order within the order, starting at 0
    pub position: i32,

    pub sku: String,
    pub name: String,
    pub color: String,
    pub unit_price: Decimal,
    pub price_includes_vat: bool,

    pub qty_34: i32,
    pub qty_36: i32,
    pub qty_38: i32,
    pub qty_40: i32,
    pub qty_42: i32,

    pub line_subtotal: Decimal,
    pub line_vat: Decimal,
    pub line_total: Decimal,
}

impl Model {
    pub fn quantities(&self) -> SizeQuantities {
        let qty = |v: i32| u32::try_from(v).unwrap_or(0);
        SizeQuantities::new()
            .with(Size::S34, qty(self.qty_34))
            .with(Size::S36, qty(self.qty_36))
            .with(Size::S38, qty(self.qty_38))
            .with(Size::S40, qty(self.qty_40))
            .with(Size::S42, qty(self.qty_42))
    }
}

/// Column values for the five quantity columns, in scale order. A quantity
/// the column cannot hold is an error, never clamped.
pub fn quantity_columns(quantities: &SizeQuantities) -> Result<[i32; 5], ServiceError> {
    let mut columns = [0; 5];
    for size in Size::ALL {
        columns[size.index()] = i32::try_from(quantities.get(size)).map_err(|_| {
            ServiceError::ValidationError(format!("quantity for size {} is out of range", size))
        })?;
    }
    Ok(columns)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub mod order;
pub mod order_item;
pub mod product;
pub mod product_size;
pub mod settings;
pub mod size;
